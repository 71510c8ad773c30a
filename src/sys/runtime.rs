use crate::config::{self, Config};
use crate::events::AppEvent;
use crate::scene::{Renderer, Scene};
use crate::store;
use crate::sys::FrameSource;
use crate::sys::capture::DetectionLoop;
use async_channel::{Receiver, Sender};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub fn block_on<R: Renderer>(
    config: Config,
    source: FrameSource,
    renderer: R,
) -> std::io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let (tx, rx) = async_channel::bounded(32);
        start_background_services(tx.clone());
        run(config, source, renderer, tx, rx).await;
    });
    Ok(())
}

pub fn start_background_services(tx: Sender<AppEvent>) {
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            config::run_async_watcher(tx).await;
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupted, shutting down");
                let _ = tx.send(AppEvent::Shutdown).await;
            }
            Err(e) => log::error!("Failed to listen for ctrl-c: {}", e),
        }
    });
}

fn ticker(hz: u32) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / hz.max(1) as f64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Drives the render and detection loops until the source ends or shutdown is requested.
pub async fn run<R: Renderer>(
    mut config: Config,
    source: FrameSource,
    mut renderer: R,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
) {
    let (writer, reader) = store::channel();
    let session = source.start(&config, writer).await;
    let detection = DetectionLoop::spawn(
        session,
        Duration::from_secs_f64(1.0 / config.runtime.detect_hz.max(1) as f64),
        Some(tx),
    );

    let mut scene = Scene::new(&config);
    let mut render = ticker(config.runtime.render_hz);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = render.tick() => {
                let now = Instant::now();
                let dt = (now - last).as_secs_f32();
                last = now;

                let frame = scene.update(dt, &reader.snapshot());
                if let Err(e) = renderer.submit(&frame) {
                    log::error!("Failed to render frame: {}", e);
                }
            }
            event = rx.recv() => match event {
                Ok(AppEvent::ConfigReload) => match config::load_config() {
                    Ok(new_config) => {
                        log::info!("Config reloaded");
                        if new_config.runtime.render_hz != config.runtime.render_hz {
                            render = ticker(new_config.runtime.render_hz);
                        }
                        scene.apply_config(&new_config);
                        detection.set_thresholds(new_config.gesture);
                        config = new_config;
                    }
                    Err(e) => log::error!("Failed to reload config: {}", e),
                },
                Ok(AppEvent::SourceEnded) => {
                    log::info!("Frame source ended");
                    break;
                }
                Ok(AppEvent::Shutdown) | Err(_) => break,
            }
        }
    }

    detection.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Gesture;
    use crate::gesture::fixtures::hand;
    use crate::scene::SceneFrame;
    use crate::scene::view::RenderError;
    use crate::sys::replay::RecordedFrame;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Gesture>>>);

    impl Renderer for Recorder {
        fn submit(&mut self, frame: &SceneFrame) -> Result<(), RenderError> {
            self.0.lock().push(frame.gesture);
            Ok(())
        }
    }

    fn test_config() -> Config {
        let mut config = Config {
            seed: Some(5),
            ..Config::default()
        };
        config.runtime.render_hz = 200;
        config.runtime.detect_hz = 200;
        config
    }

    #[tokio::test]
    async fn test_replay_drives_scene_until_source_ends() {
        let name = format!("tinsel-run-{}.ndjson", std::process::id());
        let path = std::env::temp_dir().join(name);
        let lines: Vec<String> = [0.0, 0.05, 0.1]
            .iter()
            .map(|&time| {
                serde_json::to_string(&RecordedFrame {
                    time,
                    hands: vec![hand(0.0, 0.5)],
                })
                .unwrap()
            })
            .collect();
        fs_err::write(&path, lines.join("\n")).unwrap();

        let recorder = Recorder::default();
        let (tx, rx) = async_channel::bounded(8);
        let source = FrameSource::Replay {
            path: path.clone(),
            looping: false,
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            run(test_config(), source, recorder.clone(), tx, rx),
        )
        .await
        .unwrap();
        let _ = fs_err::remove_file(&path);

        let seen = recorder.0.lock();
        assert!(!seen.is_empty());
        assert_eq!(seen.last(), Some(&Gesture::Fist));
    }

    #[tokio::test]
    async fn test_shutdown_event_stops_failed_source() {
        let recorder = Recorder::default();
        let (tx, rx) = async_channel::bounded(8);
        let source = FrameSource::Replay {
            path: "/nonexistent/recording.ndjson".into(),
            looping: true,
        };

        let stopper = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = stopper.send(AppEvent::Shutdown).await;
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            run(test_config(), source, recorder.clone(), tx, rx),
        )
        .await
        .unwrap();

        // the scene kept rendering the default gesture without a model
        let seen = recorder.0.lock();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|g| *g == Gesture::OpenPalm));
    }
}
