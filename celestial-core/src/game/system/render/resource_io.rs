use anyhow::{Context, ensure};
use image::GenericImageView;

use crate::resource::{AssetBundle, ResourcePath};

/// 读取 WGSL 着色器源码。
pub(in crate::game::system::render) fn load_shader_source(
    bundle: &AssetBundle,
    path: &str,
) -> anyhow::Result<String> {
    bundle
        .load_string(path)
        .with_context(|| format!("failed to load shader {path}"))
}

/// 解码后的非预乘 RGBA8 图像。
pub(in crate::game::system::render) struct DecodedImage {
    pub(in crate::game::system::render) rgba: Vec<u8>,
    pub(in crate::game::system::render) width: u32,
    pub(in crate::game::system::render) height: u32,
}

/// 从资源包读取并解码图片（PNG/JPEG 等 `image` 支持的格式）。
pub(in crate::game::system::render) fn load_image(
    bundle: &AssetBundle,
    path: &ResourcePath,
) -> anyhow::Result<DecodedImage> {
    let bytes = bundle
        .load(path.clone())
        .with_context(|| format!("failed to read image {path}"))?;
    let image = image::load_from_memory(bytes.as_ref())
        .with_context(|| format!("failed to decode image {path}"))?;
    let (width, height) = image.dimensions();
    ensure!(width > 0 && height > 0, "image {path} has invalid dimensions");

    Ok(DecodedImage {
        rgba: image.to_rgba8().into_raw(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .expect("应能编码 PNG");
        bytes.into_inner()
    }

    #[test]
    fn decodes_registered_png() {
        let bundle = AssetBundle::in_memory();
        bundle
            .register("Images/Earth.png", Resource::from_memory(png_bytes(3, 2)))
            .expect("应能注册资源");

        let image = load_image(&bundle, &ResourcePath::from("Images/Earth.png")).expect("应能解码");
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.rgba.len(), 3 * 2 * 4);
        assert_eq!(&image.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_or_corrupt_images_fail() {
        let bundle = AssetBundle::in_memory();
        assert!(load_image(&bundle, &ResourcePath::from("Images/None.png")).is_err());

        bundle
            .register("Images/Broken.png", Resource::from_memory(vec![1, 2, 3]))
            .expect("应能注册资源");
        assert!(load_image(&bundle, &ResourcePath::from("Images/Broken.png")).is_err());
    }

    #[test]
    fn builtin_shaders_are_available() {
        let bundle = AssetBundle::in_memory();
        let source = load_shader_source(&bundle, "shaders/overlay.wgsl").expect("内置着色器应存在");
        assert!(source.contains("fs_main"));
    }
}
