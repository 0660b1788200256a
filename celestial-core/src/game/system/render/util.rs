use anyhow::ensure;
use nalgebra::Matrix4;

use crate::color::Color;

/// 为纹理上传对齐 RGBA 行数据：将每行补齐到 `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`。
pub(in crate::game::system::render) fn pad_rgba_data(
    data: Vec<u8>,
    width: u32,
    height: u32,
) -> anyhow::Result<(Vec<u8>, u32)> {
    ensure!(
        width > 0 && height > 0,
        "texture dimensions must be positive"
    );

    let bytes_per_pixel = 4usize;
    let width_usize = width as usize;
    let height_usize = height as usize;
    let unpadded_bytes_per_row = width_usize * bytes_per_pixel;
    let expected_len = unpadded_bytes_per_row * height_usize;
    ensure!(
        data.len() == expected_len,
        "RGBA data length {} does not match expected {} for {}x{} texture",
        data.len(),
        expected_len,
        width,
        height,
    );

    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_bytes_per_row = ((unpadded_bytes_per_row + alignment - 1) / alignment) * alignment;

    if padded_bytes_per_row == unpadded_bytes_per_row {
        return Ok((data, unpadded_bytes_per_row as u32));
    }

    let mut padded = vec![0u8; padded_bytes_per_row * height_usize];
    for row in 0..height_usize {
        let src_start = row * unpadded_bytes_per_row;
        let dst_start = row * padded_bytes_per_row;
        let src_end = src_start + unpadded_bytes_per_row;
        padded[dst_start..dst_start + unpadded_bytes_per_row]
            .copy_from_slice(&data[src_start..src_end]);
    }

    Ok((padded, padded_bytes_per_row as u32))
}

/// 将 OpenGL 风格的裁剪空间 Z（NDC Z ∈ [-1, 1]）转换为 wgpu/WebGPU 风格（NDC Z ∈ [0, 1]）。
pub(in crate::game::system::render) fn opengl_to_wgpu_matrix() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0,
    )
}

/// 写入渲染目标前的颜色：sRGB 格式的目标需要线性值。
pub(in crate::game::system::render) fn target_color(color: Color, format: wgpu::TextureFormat) -> [f32; 4] {
    if format.is_srgb() {
        color.to_linear().to_array()
    } else {
        color.to_array()
    }
}

pub(in crate::game::system::render) fn cast_slice_f32(data: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            data.as_ptr() as *const u8,
            data.len() * std::mem::size_of::<f32>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    #[test]
    fn pad_rgba_data_returns_error_on_mismatched_length() {
        let result = pad_rgba_data(vec![0u8; 3], 1, 1);
        assert!(result.is_err());
    }

    #[test]
    fn pad_rgba_data_pads_rows_to_alignment() {
        // width=1 => 4 bytes/row, alignment=256 => padded row 256.
        let width = 1u32;
        let height = 2u32;
        let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let (padded, bytes_per_row) = pad_rgba_data(data, width, height).unwrap();

        assert_eq!(
            bytes_per_row as usize,
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize
        );
        assert_eq!(padded.len(), bytes_per_row as usize * height as usize);

        assert_eq!(&padded[0..4], &[1, 2, 3, 4]);
        assert_eq!(
            &padded[bytes_per_row as usize..bytes_per_row as usize + 4],
            &[5, 6, 7, 8]
        );
    }

    #[test]
    fn target_color_linearizes_for_srgb_targets() {
        let gray = Color::rgb(0.5, 0.5, 0.5);
        let linear = target_color(gray, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!((linear[0] - 0.214).abs() < 1e-3);
        assert_eq!(linear[3], 1.0);
        assert_eq!(target_color(gray, wgpu::TextureFormat::Bgra8Unorm), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn opengl_to_wgpu_matrix_maps_z_range() {
        let m = opengl_to_wgpu_matrix();

        let v_near = Vector4::new(0.0, 0.0, -1.0, 1.0);
        let v_far = Vector4::new(0.0, 0.0, 1.0, 1.0);

        let out_near = m * v_near;
        let out_far = m * v_far;

        assert!((out_near.z - 0.0).abs() < 1.0e-6);
        assert!((out_far.z - 1.0).abs() < 1.0e-6);
    }
}
