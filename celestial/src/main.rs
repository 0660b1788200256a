mod intro;
mod main_view;
mod stage;
mod structure;
mod universe;

use std::path::PathBuf;

use tracing::{info, warn};

use celestial_core::{Game, audio::Sound, config::GameConfig, logger};

use crate::intro::IntroController;

const ASSETS_ENV: &str = "CELESTIAL_ASSETS";
const BACKGROUND_MUSIC: &str = "Music/pulsar.mp3";

fn main() -> anyhow::Result<()> {
    logger::init()?;

    let mut config = GameConfig::default();
    if let Some(dir) = std::env::var_os(ASSETS_ENV) {
        config.assets_dir = PathBuf::from(dir);
    }
    info!(target: "celestial", assets = %config.assets_dir.display(), "starting Celestial");

    let game = Game::new(config, IntroController::new())?;
    play_background_music(&game);
    game.run()
}

/// 背景音乐只播放一次；文件缺失时静默继续。
fn play_background_music(game: &Game) {
    let context = game.context();
    let music = match Sound::load(&context.bundle, BACKGROUND_MUSIC) {
        Ok(music) => music,
        Err(err) => {
            warn!(target: "celestial", error = %err, "Couldn't find background music file.");
            return;
        }
    };
    if let Err(err) = context.audio.play(&music) {
        warn!(target: "celestial", error = %err, "failed to play background music");
    }
}
