//! Rebuild a scene graph from a worker response
//!
//! Runs on the caller's thread. Every geometry is validated before any
//! buffer is built, so a malformed message never yields a partial scene.

use std::sync::Arc;

use crate::error::AssetError;
use crate::protocol::{ShallowGeometry, TextureDescriptor};
use crate::scene::{ColorSpace, Group, Material, Mesh, Texture};

/// Build one mesh per geometry, all sharing a single unlit material made
/// from the transferred raster
pub fn reconstruct(
    geometries: Vec<ShallowGeometry>,
    texture: TextureDescriptor,
) -> Result<Group, AssetError> {
    for (i, geometry) in geometries.iter().enumerate() {
        geometry
            .validate()
            .map_err(|e| AssetError::TransferError(format!("geometry {}: {}", i, detail(e))))?;
    }

    let material = Arc::new(Material::unlit(Arc::new(texture_from_descriptor(texture)?)));

    let meshes = geometries
        .into_iter()
        .map(|shallow| {
            // Validated above
            Mesh::new(Arc::new(shallow.into_geometry_unchecked()), material.clone())
        })
        .collect::<Vec<_>>();

    Ok(Group::from_meshes(meshes))
}

fn detail(e: AssetError) -> String {
    match e {
        AssetError::TransferError(msg) => msg,
        other => other.to_string(),
    }
}

/// Turn a transferred raster into a texture. The pixel buffer must hold
/// exactly `width * height` RGBA8 texels.
pub fn texture_from_descriptor(descriptor: TextureDescriptor) -> Result<Texture, AssetError> {
    let TextureDescriptor {
        image,
        mapping,
        sampler,
        format,
        anisotropy,
    } = descriptor;

    let expected = (image.width as usize)
        .checked_mul(image.height as usize)
        .and_then(|texels| texels.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| AssetError::TransferError("raster dimensions overflow".into()))?;
    if image.pixels.len() != expected {
        return Err(AssetError::TransferError(format!(
            "raster is {} bytes, expected {} for {}x{}",
            image.pixels.len(),
            expected,
            image.width,
            image.height
        )));
    }

    let raster = image::RgbaImage::from_raw(image.width, image.height, image.pixels)
        .ok_or_else(|| AssetError::TransferError("raster does not fit its dimensions".into()))?;

    Ok(Texture {
        image: raster,
        mapping,
        sampler,
        format,
        anisotropy: anisotropy.max(1),
        color_space: ColorSpace::Srgb,
    })
}
