use std::collections::HashSet;

use crate::paint::Color;

use super::{Command, WgpuBackend};

/// One render pass: a target, its load operations and the draws in it.
#[derive(Debug, PartialEq)]
pub(super) struct PassPlan {
    pub target: Option<u32>,
    pub color_clear: Option<Color>,
    pub stencil_clear: bool,
    /// Indices into the command list.
    pub draws: Vec<usize>,
}

impl PassPlan {
    fn new(target: Option<u32>) -> Self {
        Self {
            target,
            color_clear: None,
            stencil_clear: false,
            draws: Vec::new(),
        }
    }
}

/// Splits the recorded commands into passes. A pass ends when the target
/// changes or a clear follows a draw.
pub(super) fn plan_passes(commands: &[Command]) -> Vec<PassPlan> {
    fn reopen<'a>(
        open: &'a mut Option<PassPlan>,
        plans: &mut Vec<PassPlan>,
        target: Option<u32>,
    ) -> &'a mut PassPlan {
        if open.as_ref().is_some_and(|p| !p.draws.is_empty()) {
            plans.extend(open.take());
        }
        open.get_or_insert_with(|| PassPlan::new(target))
    }

    let mut plans = Vec::new();
    let mut open: Option<PassPlan> = None;
    let mut target = None;

    for (i, cmd) in commands.iter().enumerate() {
        match cmd {
            Command::Target(t) => {
                if *t != target {
                    plans.extend(open.take());
                    target = *t;
                }
            }
            Command::ClearColor(c) => reopen(&mut open, &mut plans, target).color_clear = Some(*c),
            Command::ClearStencil => reopen(&mut open, &mut plans, target).stencil_clear = true,
            Command::Draw(_) => open
                .get_or_insert_with(|| PassPlan::new(target))
                .draws
                .push(i),
        }
    }
    plans.extend(open);
    plans
}

impl WgpuBackend {
    pub(super) fn submit(&mut self) {
        let mut plans = plan_passes(&self.commands);
        if self.surface_view.is_some() && !plans.iter().any(|p| p.target.is_none()) {
            // The swapchain image is undefined until cleared.
            plans.push(PassPlan::new(None));
        }
        if plans.is_empty() {
            return;
        }
        self.upload_uniforms();
        self.prepare_draws();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tilescape frame encoder"),
            });

        let mut first_use: HashSet<Option<u32>> = HashSet::new();
        for plan in &plans {
            let color_view = match plan.target {
                None => self.surface_view.as_ref().map(|(v, _, _)| v),
                Some(fb) => self
                    .framebuffers
                    .get(&fb)
                    .and_then(|f| self.textures.get(&f.color))
                    .map(|t| &t.view),
            };
            let stencil_view = match plan.target {
                None => self.screen_stencil.as_ref().map(|s| &s.view),
                Some(fb) => self.framebuffers.get(&fb).map(|f| &f.stencil.view),
            };
            let (Some(color_view), Some(stencil_view)) = (color_view, stencil_view) else {
                log::debug!("pass for missing target {:?} skipped", plan.target);
                continue;
            };

            let first = first_use.insert(plan.target);
            let color_load = match plan.color_clear {
                Some(c) => wgpu::LoadOp::Clear(to_wgpu_color(c)),
                None if first && plan.target.is_none() => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                None => wgpu::LoadOp::Load,
            };
            let stencil_load = if plan.stencil_clear || first {
                wgpu::LoadOp::Clear(0)
            } else {
                wgpu::LoadOp::Load
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tilescape pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: stencil_view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let Some((_, uniform_group, _)) = self.uniform_buffer.as_ref() else {
                continue;
            };
            for &i in &plan.draws {
                let Some(Command::Draw(d)) = self.commands.get(i) else {
                    continue;
                };
                let pipeline = self.pipelines.get(&d.pipeline);
                let texture_group = self.textures.get(&d.texture).and_then(|t| t.bind_group.as_ref());
                let vertices = self.buffers.get(&d.vertices);
                let indices = self.buffers.get(&d.indices);
                let (Some(pipeline), Some(texture_group), Some(vertices), Some(indices)) =
                    (pipeline, texture_group, vertices, indices)
                else {
                    log::debug!("draw referencing released storage skipped");
                    continue;
                };

                let [x, y, w, h] = d.viewport;
                pass.set_pipeline(pipeline);
                pass.set_stencil_reference(d.stencil_reference);
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
                pass.set_bind_group(0, uniform_group, &[d.uniform_offset]);
                pass.set_bind_group(1, texture_group, &[]);
                pass.set_vertex_buffer(0, vertices.buffer.slice(..));
                pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(d.range.clone(), d.base_vertex, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn upload_uniforms(&mut self) {
        if self.uniforms.is_empty() {
            return;
        }
        let required = self.uniforms.len() as u64;
        let fits = self
            .uniform_buffer
            .as_ref()
            .is_some_and(|(_, _, capacity)| *capacity >= required);

        if !fits {
            let capacity = required.next_power_of_two().max(4096);
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tilescape draw uniforms"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tilescape draw uniform group"),
                layout: &self.pipelines.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(
                            std::mem::size_of::<super::DrawUniform>() as u64
                        ),
                    }),
                }],
            });
            self.uniform_buffer = Some((buffer, group, capacity));
        }

        if let Some((buffer, _, _)) = self.uniform_buffer.as_ref() {
            self.queue.write_buffer(buffer, 0, &self.uniforms);
        }
    }

    /// Builds the pipelines and texture bind groups the recorded draws use.
    fn prepare_draws(&mut self) {
        let mut missing_groups = Vec::new();
        for cmd in &self.commands {
            let Command::Draw(d) = cmd else { continue };
            self.pipelines.ensure(&self.device, d.pipeline);
            if self
                .textures
                .get(&d.texture)
                .is_some_and(|t| t.bind_group.is_none())
                && !missing_groups.contains(&d.texture)
            {
                missing_groups.push(d.texture);
            }
        }

        for id in missing_groups {
            let Some(style) = self.textures.get(&id).map(|t| t.style) else {
                continue;
            };
            let sampler = self.sampler(style);
            let Some(entry) = self.textures.get_mut(&id) else {
                continue;
            };
            entry.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tilescape texture group"),
                layout: &self.pipelines.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&entry.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            }));
        }
    }
}

fn to_wgpu_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::super::pipelines::{PipelineKey, ProgramKind, StencilKey};
    use super::super::DrawRecord;
    use super::*;

    fn draw() -> Command {
        Command::Draw(DrawRecord {
            pipeline: PipelineKey {
                program: ProgramKind::Textured,
                stencil: StencilKey::Disabled,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
            },
            stencil_reference: 0,
            texture: 1,
            vertices: 2,
            indices: 3,
            range: 0..6,
            base_vertex: 0,
            uniform_offset: 0,
            viewport: [0.0, 0.0, 16.0, 16.0],
        })
    }

    #[test]
    fn consecutive_draws_share_a_pass() {
        let plans = plan_passes(&[draw(), draw(), draw()]);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].draws, vec![0, 1, 2]);
    }

    #[test]
    fn target_switch_splits_passes() {
        let plans = plan_passes(&[
            draw(),
            Command::Target(Some(7)),
            Command::ClearColor(Color::TRANSPARENT),
            draw(),
            Command::Target(None),
            draw(),
        ]);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].target, Some(7));
        assert_eq!(plans[1].color_clear, Some(Color::TRANSPARENT));
        assert_eq!(plans[2].target, None);
        assert_eq!(plans[2].color_clear, None);
    }

    #[test]
    fn clear_after_draw_opens_a_new_pass() {
        let plans = plan_passes(&[draw(), Command::ClearStencil, draw()]);
        assert_eq!(plans.len(), 2);
        assert!(!plans[0].stencil_clear);
        assert!(plans[1].stencil_clear);
    }

    #[test]
    fn clear_before_any_draw_folds_into_the_pass() {
        let plans = plan_passes(&[Command::ClearColor(Color::BLACK), Command::ClearStencil, draw()]);
        assert_eq!(plans.len(), 1);
        assert!(plans[0].stencil_clear);
        assert_eq!(plans[0].color_clear, Some(Color::BLACK));
    }

    #[test]
    fn clear_without_draws_still_produces_a_pass() {
        let plans = plan_passes(&[Command::Target(Some(3)), Command::ClearColor(Color::WHITE)]);
        assert_eq!(plans.len(), 1);
        assert!(plans[0].draws.is_empty());
    }
}
