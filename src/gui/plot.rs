//! Rolling forward/reflected power plot.

use crate::measurement::MeasurementSample;
use egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::collections::VecDeque;

/// Bounded history of power readings, x = session seconds.
pub struct PowerHistory {
    capacity: usize,
    forward: VecDeque<[f64; 2]>,
    reflected: VecDeque<[f64; 2]>,
}

impl PowerHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            forward: VecDeque::with_capacity(capacity),
            reflected: VecDeque::with_capacity(capacity),
        }
    }

    /// Record the power readings of a sample; `N/A` readings leave a gap.
    pub fn push(&mut self, sample: &MeasurementSample) {
        let t = sample.elapsed.as_secs_f64();
        if let Some(w) = sample.forward_w {
            push_bounded(&mut self.forward, [t, w], self.capacity);
        }
        if let Some(w) = sample.reflected_w {
            push_bounded(&mut self.reflected, [t, w], self.capacity);
        }
    }

    pub fn forward(&self) -> &VecDeque<[f64; 2]> {
        &self.forward
    }

    pub fn reflected(&self) -> &VecDeque<[f64; 2]> {
        &self.reflected
    }
}

fn push_bounded(points: &mut VecDeque<[f64; 2]>, point: [f64; 2], capacity: usize) {
    if points.len() >= capacity {
        points.pop_front();
    }
    points.push_back(point);
}

pub fn power_plot(ui: &mut Ui, history: &PowerHistory) {
    let forward = Line::new(PlotPoints::from_iter(history.forward().iter().copied()))
        .name("Forward (W)");
    let reflected = Line::new(PlotPoints::from_iter(history.reflected().iter().copied()))
        .name("Reflected (W)");

    Plot::new("power_history")
        .legend(Legend::default())
        .height(200.0)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(forward);
            plot_ui.line(reflected);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::RawReadings;
    use std::time::Duration;

    #[test]
    fn history_is_bounded() {
        let mut history = PowerHistory::new(3);
        for i in 0..5 {
            let sample = MeasurementSample::from_readings(
                i + 1,
                Duration::from_secs(i),
                RawReadings {
                    forward_w: Some(i as f64),
                    ..RawReadings::default()
                },
            );
            history.push(&sample);
        }
        assert_eq!(history.forward().len(), 3);
        assert_eq!(history.forward().front(), Some(&[2.0, 2.0]));
        assert!(history.reflected().is_empty());
    }
}
