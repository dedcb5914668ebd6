//! Compute dispatchers (§4.9): GPU-side population of the textures owned by
//! [`crate::texture::MapTextureManager`]. Everything here runs in 8x8
//! workgroups and is the *only* path allowed to touch those textures after
//! initial upload — no per-pixel CPU work in steady state.

use crate::texture::{GpuTexture, MapTextureManager, MapTextureKind};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 8;

fn dispatch_size(extent: u32) -> u32 {
    (extent + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat, access: wgpu::StorageTextureAccess) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture { access, format, view_dimension: wgpu::TextureViewDimension::D2 },
        count: None,
    }
}

fn sampled_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Uint,
        },
        count: None,
    }
}

fn storage_buffer_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Storage { read_only }, has_dynamic_offset: false, min_binding_size: None },
        count: None,
    }
}

/// Owner texture dispatcher: ProvinceID texture + a `ProvinceId -> CountryId`
/// structured buffer in, ProvinceOwner texture out. Budget: < 2ms for 10k
/// provinces, hence the flat 8x8 dispatch over the full map extent rather
/// than per-province work.
pub struct OwnerTextureDispatcher {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl OwnerTextureDispatcher {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("owner_texture_layout"),
            entries: &[
                sampled_texture_entry(0),                                                        // province_id
                storage_buffer_entry(1, true),                                                    // province_owners
                storage_texture_entry(2, wgpu::TextureFormat::R16Uint, wgpu::StorageTextureAccess::WriteOnly), // province_owner out
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("owner_texture_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/owner_texture.wgsl"));
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("owner_texture_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        Self { pipeline, layout }
    }

    /// `province_owners` is a flat `u16` array indexed by `ProvinceId`,
    /// uploaded fresh whenever ownership changes (driven by
    /// `ProvinceOwnershipChanged` events, not every frame).
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures: &MapTextureManager,
        province_owners: &[u16],
    ) {
        let owners_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("province_owners_buffer"),
            contents: bytemuck::cast_slice(province_owners),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let province_id = textures.texture(MapTextureKind::ProvinceId);
        let owner = textures.texture(MapTextureKind::ProvinceOwner);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("owner_texture_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&province_id.view) },
                wgpu::BindGroupEntry { binding: 1, resource: owners_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&owner.view) },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("owner_texture_encoder") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("owner_texture_pass"), timestamp_writes: None });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(dispatch_size(province_id.width), dispatch_size(province_id.height), 1);
        }
        queue.submit(Some(encoder.finish()));
    }
}

/// Border detection dispatcher (pixel-based fallback, §4.9): marks a pixel
/// as a country/province border if any 4-neighbor disagrees on owner or
/// province id. Used by [`crate::border::RenderingMode::PixelPerfect`]; the
/// vector-curve pipeline in [`crate::border`] supersedes this for
/// `VectorCurves` mode but both write the same BorderMask format.
pub struct BorderDetectionDispatcher {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl BorderDetectionDispatcher {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("border_detection_layout"),
            entries: &[
                sampled_texture_entry(0), // province_id
                sampled_texture_entry(1), // province_owner
                storage_texture_entry(2, wgpu::TextureFormat::Rg8Unorm, wgpu::StorageTextureAccess::WriteOnly), // border_mask out
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("border_detection_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/border_detection.wgsl"));
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("border_detection_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        Self { pipeline, layout }
    }

    pub fn dispatch(&self, device: &wgpu::Device, queue: &wgpu::Queue, textures: &MapTextureManager) {
        let province_id = textures.texture(MapTextureKind::ProvinceId);
        let owner = textures.texture(MapTextureKind::ProvinceOwner);
        let border_mask = textures.texture(MapTextureKind::BorderMask);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("border_detection_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&province_id.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&owner.view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&border_mask.view) },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("border_detection_encoder") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("border_detection_pass"), timestamp_writes: None });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(dispatch_size(province_id.width), dispatch_size(province_id.height), 1);
        }
        queue.submit(Some(encoder.finish()));
    }
}

/// Optional post-effect compute pass (Gaussian blur, fog noise, ...)
/// layered on top of base textures. Kept deliberately generic: post-effects
/// are additive and game-policy, not part of the fixed texture set.
pub struct PostEffectDispatcher {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl PostEffectDispatcher {
    pub fn new(device: &wgpu::Device, shader_source: wgpu::ShaderModuleDescriptor, entry_point: &str) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_effect_layout"),
            entries: &[
                sampled_texture_entry(0),
                storage_texture_entry(1, wgpu::TextureFormat::Rgba8Unorm, wgpu::StorageTextureAccess::WriteOnly),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post_effect_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(shader_source);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("post_effect_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        Self { pipeline, layout }
    }

    pub fn dispatch(&self, device: &wgpu::Device, queue: &wgpu::Queue, input: &GpuTexture, output: &GpuTexture) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post_effect_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&input.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&output.view) },
            ],
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("post_effect_encoder") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("post_effect_pass"), timestamp_writes: None });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(dispatch_size(input.width), dispatch_size(input.height), 1);
        }
        queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_size_rounds_up() {
        assert_eq!(dispatch_size(5632), 704);
        assert_eq!(dispatch_size(2048), 256);
        assert_eq!(dispatch_size(1), 1);
        assert_eq!(dispatch_size(8), 1);
        assert_eq!(dispatch_size(9), 2);
    }
}
