//! 音频播放。
//!
//! 默认启用的 `audio` feature 通过 `rodio` 输出。关闭该 feature 或没有可用的输出设备时，
//! [`AudioPlayer`] 为静音实现，播放请求只记录日志。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::resource::{AssetBundle, ResourceError, ResourcePath};

/// 已读入内存的音频文件（未解码）。
#[derive(Clone)]
pub struct Sound {
    path: ResourcePath,
    bytes: Arc<[u8]>,
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Sound {
    /// 从资源包读取音频文件。
    pub fn load(bundle: &AssetBundle, path: impl Into<ResourcePath>) -> Result<Self, ResourceError> {
        let path = path.into();
        let bytes = bundle.load(path.clone())?;
        if bytes.is_empty() {
            return Err(ResourceError::Empty(path));
        }
        Ok(Self { path, bytes })
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 音频输出设备。必须在创建它的线程上持有，销毁后所有播放停止。
pub struct AudioOutput {
    #[cfg(feature = "audio")]
    _stream: Option<rodio::OutputStream>,
    player: AudioPlayer,
}

impl AudioOutput {
    /// 打开默认输出设备；失败时退化为静音。
    pub fn open() -> Self {
        #[cfg(feature = "audio")]
        let (stream, handle) = match rodio::OutputStream::try_default() {
            Ok((stream, handle)) => {
                debug!(target: "celestial-core", "audio output opened");
                (Some(stream), Some(handle))
            }
            Err(err) => {
                warn!(target: "celestial-core", error = %err, "no audio output device, sound disabled");
                (None, None)
            }
        };

        #[cfg(not(feature = "audio"))]
        warn!(target: "celestial-core", "built without audio feature, sound disabled");

        Self {
            #[cfg(feature = "audio")]
            _stream: stream,
            player: AudioPlayer {
                #[cfg(feature = "audio")]
                handle,
            },
        }
    }

    /// 可跨线程克隆的播放句柄。
    pub fn player(&self) -> AudioPlayer {
        self.player.clone()
    }
}

/// 播放句柄。
#[derive(Clone, Default)]
pub struct AudioPlayer {
    #[cfg(feature = "audio")]
    handle: Option<rodio::OutputStreamHandle>,
}

impl std::fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("silent", &self.is_silent())
            .finish()
    }
}

impl AudioPlayer {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        #[cfg(feature = "audio")]
        {
            self.handle.is_none()
        }
        #[cfg(not(feature = "audio"))]
        {
            true
        }
    }

    /// 从头播放一次，不阻塞。解码失败时返回错误。
    pub fn play(&self, sound: &Sound) -> anyhow::Result<()> {
        #[cfg(feature = "audio")]
        if let Some(handle) = &self.handle {
            use anyhow::Context;

            let decoder = rodio::Decoder::new(std::io::Cursor::new(Arc::clone(&sound.bytes)))
                .with_context(|| format!("failed to decode audio {}", sound.path))?;
            let sink = rodio::Sink::try_new(handle)
                .with_context(|| format!("failed to create sink for {}", sound.path))?;
            sink.append(decoder);
            sink.detach();
            return Ok(());
        }

        debug!(target: "celestial-core", sound = %sound.path, "silent playback");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    #[test]
    fn missing_sound_is_not_found() {
        let bundle = AssetBundle::in_memory();
        let err = Sound::load(&bundle, "Music/confirmation.mp3").expect_err("资源不存在时应失败");
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[test]
    fn sound_loads_from_disk() {
        let dir = tempfile::tempdir().expect("应能创建临时目录");
        std::fs::create_dir_all(dir.path().join("Music")).expect("应能创建目录");
        std::fs::write(dir.path().join("Music").join("pulsar.mp3"), [1u8, 2, 3]).expect("应能写入文件");

        let bundle = AssetBundle::new(dir.path());
        let sound = Sound::load(&bundle, "Music/pulsar.mp3").expect("应能读取音频文件");
        assert_eq!(sound.len(), 3);
        assert_eq!(sound.path().to_string(), "Music/pulsar.mp3");
    }

    #[test]
    fn empty_sound_is_rejected() {
        let bundle = AssetBundle::in_memory();
        bundle
            .register("Music/empty.mp3", Resource::from_memory(Vec::new()))
            .expect("应能注册资源");
        let err = Sound::load(&bundle, "Music/empty.mp3").expect_err("空文件应失败");
        assert!(matches!(err, ResourceError::Empty(_)));
    }

    #[test]
    fn silent_player_accepts_playback() {
        let bundle = AssetBundle::in_memory();
        bundle
            .register("Music/x.mp3", Resource::from_memory(vec![0u8; 4]))
            .expect("应能注册资源");
        let sound = Sound::load(&bundle, "Music/x.mp3").expect("应能读取");
        let player = AudioPlayer::silent();
        assert!(player.is_silent());
        player.play(&sound).expect("静音播放不应失败");
    }

    #[cfg(feature = "audio")]
    #[test]
    fn output_is_audible_when_a_device_exists() {
        let device_available = rodio::OutputStream::try_default().is_ok();
        let output = AudioOutput::open();
        assert_eq!(
            output.player().is_silent(),
            !device_available,
            "有输出设备时应得到可发声的播放句柄"
        );
    }
}
