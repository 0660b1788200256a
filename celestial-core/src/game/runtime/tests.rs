use super::*;
use super::helpers::{canvas_scale, clamp_frame_delta, gesture_to_canvas};
use crate::{
    event::{Event, Gesture},
    game::{
        overlay::{ButtonContent, Element, ElementId, Rect},
        system::logic::{Transition, View},
    },
    text::FontDescriptor,
};
use anyhow::Result;
use nalgebra::Point2;
use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

type Log = Arc<StdMutex<Vec<String>>>;

struct Probe {
    log: Log,
    button: Option<ElementId>,
}

#[async_trait::async_trait]
impl ViewController for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn load(&mut self, view: &mut View, _context: &AppContext) -> Result<()> {
        let button = view.overlay.add(Element::button(
            Rect::new(100.0, 100.0, 200.0, 50.0),
            ButtonContent::titled("Explore", FontDescriptor::thin(), 20.0),
        ));
        view.overlay.set_enabled(button, true);
        self.button = Some(button);
        self.log.lock().expect("锁未中毒").push("load".into());
        Ok(())
    }

    fn update(
        &mut self,
        _view: &mut View,
        delta: f32,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        self.log
            .lock()
            .expect("锁未中毒")
            .push(format!("update {delta:.3}"));
        Ok(None)
    }

    fn on_event(
        &mut self,
        _view: &mut View,
        event: &Event,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        let entry = match event {
            Event::ButtonPressed(id) if Some(*id) == self.button => "button".to_string(),
            Event::Gesture(Gesture::Tap { position }) => {
                format!("tap {:.0},{:.0}", position.x, position.y)
            }
            Event::CloseRequested => "close".to_string(),
            other => format!("{other:?}"),
        };
        self.log.lock().expect("锁未中毒").push(entry);
        Ok(None)
    }
}

fn game_with_probe() -> (Game, Log) {
    let log = Log::default();
    let dir = tempfile::tempdir().expect("应能创建临时目录");
    let config = GameConfig {
        assets_dir: dir.path().to_path_buf(),
        ..GameConfig::default()
    };
    let game = Game::new(
        config,
        Probe {
            log: Arc::clone(&log),
            button: None,
        },
    )
    .expect("应能创建运行时");
    (game, log)
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().expect("锁未中毒").clone()
}

#[test]
fn root_is_presented_once() {
    let (mut game, log) = game_with_probe();
    assert!(game.stack().is_empty());

    game.present_root();
    game.present_root();

    assert_eq!(game.stack().len(), 1);
    assert_eq!(game.stack().top_name(), Some("probe"));
    assert_eq!(entries(&log), vec!["load"]);
}

#[test]
fn frame_delta_is_clamped() {
    let (mut game, log) = game_with_probe();
    game.present_root();

    game.advance(Duration::from_millis(16));
    game.advance(Duration::from_secs(5));

    assert_eq!(entries(&log), vec!["load", "update 0.016", "update 0.250"]);
}

#[test]
fn taps_on_buttons_become_button_presses() {
    let (mut game, log) = game_with_probe();
    game.present_root();

    // 无窗口时帧缓冲与画布同尺寸，坐标不缩放
    game.dispatch_event(Event::Gesture(Gesture::Tap {
        position: Point2::new(150.0, 120.0),
    }));
    game.dispatch_event(Event::Gesture(Gesture::Tap {
        position: Point2::new(10.0, 10.0),
    }));
    game.dispatch_close();

    assert_eq!(entries(&log), vec!["load", "button", "tap 10,10", "close"]);
    assert!(game.stopped);
}

#[test]
fn capture_reflects_top_view() {
    let (mut game, _log) = game_with_probe();
    let empty = game.capture_frame();
    assert!(empty.overlay.is_empty());

    game.present_root();
    let frame = game.capture_frame();
    assert!(frame.scene.is_none());
    assert!(!frame.overlay.is_empty());
    assert_eq!(frame.canvas, Vector2::new(1000.0, 800.0));
}

#[test]
fn gestures_are_converted_to_canvas_points() {
    let scale = canvas_scale(Vector2::new(1000.0, 800.0), (2000, 1600));
    assert_eq!(scale, Vector2::new(0.5, 0.5));

    let tap = gesture_to_canvas(
        Gesture::Tap {
            position: Point2::new(400.0, 300.0),
        },
        scale,
    );
    assert_eq!(
        tap,
        Gesture::Tap {
            position: Point2::new(200.0, 150.0)
        }
    );

    let pan = gesture_to_canvas(
        Gesture::Pan {
            delta: Vector2::new(-20.0, 8.0),
        },
        scale,
    );
    assert_eq!(
        pan,
        Gesture::Pan {
            delta: Vector2::new(-10.0, 4.0)
        }
    );

    let zoom = Gesture::Zoom { factor: 0.9 };
    assert_eq!(gesture_to_canvas(zoom, scale), zoom);
}

#[test]
fn clamp_frame_delta_limits_long_frames() {
    assert!((clamp_frame_delta(Duration::from_millis(10), 250) - 0.01).abs() < 1e-6);
    assert_eq!(clamp_frame_delta(Duration::from_secs(3), 250), 0.25);
}
