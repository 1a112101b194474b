use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use interstab::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct ProgressView {
    pb: ProgressBar,
    phase: &'static str,
    samples: u64,
}

/// Renders engine progress events on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    view: Arc<Mutex<ProgressView>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.disable_steady_tick();
        pb.finish_and_clear();

        Self {
            view: Arc::new(Mutex::new(ProgressView {
                pb,
                phase: "",
                samples: 0,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let view = self.view.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut view) = view.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    view.phase = name;
                    view.samples = 0;
                    let pb = &view.pb;
                    pb.reset();
                    pb.set_length(0);
                    pb.set_style(Self::spinner_style());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb.set_message(name.to_string());
                }
                Progress::PhaseFinish => {
                    view.pb.disable_steady_tick();
                    view.pb.finish_with_message("✓ Done");
                }
                Progress::TaskStart { total_steps } => {
                    let pb = &view.pb;
                    pb.disable_steady_tick();
                    pb.reset();
                    pb.set_length(total_steps);
                    pb.set_position(0);
                    pb.set_style(Self::bar_style());
                    pb.set_message(view.phase.to_string());
                }
                Progress::TaskIncrement => {
                    view.pb.inc(1);
                }
                Progress::TaskFinish => {
                    let pb = &view.pb;
                    let length = pb.length().unwrap_or(0);
                    if pb.position() < length {
                        pb.set_position(length);
                    }
                    pb.finish();
                }
                Progress::Sampled { .. } => {
                    view.samples += 1;
                    // Samples inside a bar-driven task would overwrite its label.
                    if view.pb.length() == Some(0) && !view.pb.is_finished() {
                        let message = format!("{} ({} hull queries)", view.phase, view.samples);
                        view.pb.set_message(message);
                    }
                }
                Progress::Message(msg) => {
                    if !view.pb.is_finished() {
                        view.pb.println(format!("  {}", msg));
                    } else {
                        view.pb.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let view = handler.view.lock().unwrap();
        assert_eq!(view.pb.length(), Some(0));
        assert!(view.pb.is_finished());
        assert_eq!(view.samples, 0);
    }

    #[test]
    fn callback_updates_progress_bar_state() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Candidate Screening",
        });
        {
            let view = handler.view.lock().unwrap();
            assert_eq!(view.pb.message(), "Candidate Screening");
            assert!(!view.pb.is_finished());
            assert_eq!(view.pb.length(), Some(0));
        }

        callback(Progress::TaskStart { total_steps: 10 });
        {
            let view = handler.view.lock().unwrap();
            assert_eq!(view.pb.length(), Some(10));
            assert_eq!(view.pb.position(), 0);
        }

        callback(Progress::TaskIncrement);
        assert_eq!(handler.view.lock().unwrap().pb.position(), 1);

        callback(Progress::TaskFinish);
        {
            let view = handler.view.lock().unwrap();
            assert!(view.pb.is_finished());
            assert_eq!(view.pb.position(), 10);
        }

        callback(Progress::PhaseFinish);
        assert_eq!(handler.view.lock().unwrap().pb.message(), "✓ Done");
    }

    #[test]
    fn samples_are_counted_in_the_spinner_message() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Closed Mixing",
        });
        callback(Progress::Sampled { ratio: 0.0 });
        callback(Progress::Sampled { ratio: 1.0 });

        let view = handler.view.lock().unwrap();
        assert_eq!(view.samples, 2);
        assert_eq!(view.pb.message(), "Closed Mixing (2 hull queries)");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: "Open Mixing" });
            callback(Progress::Sampled { ratio: 0.5 });
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        let view = handler.view.lock().unwrap();
        assert!(view.pb.is_finished());
        assert_eq!(view.pb.message(), "✓ Done");
        assert_eq!(view.samples, 1);
    }
}
