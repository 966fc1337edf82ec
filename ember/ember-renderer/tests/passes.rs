mod common;

use common::{context, context_with, recorder, recorder_mut};
use ember_renderer::gbuffer::{ObjectUniform, OBJECT_FLAG_LIGHTING};
use ember_renderer::light_pass::LightUniform;
use ember_renderer::{BlendFactor, Capabilities, CompareFunc, EmberConfig, Pass, Topology};
use render_api::{BlendDesc, Call, ProgramKind, RenderTarget};

fn triangle(ctx: &mut ember_renderer::Context) {
    ctx.begin(Topology::Triangles);
    for i in 0..3 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
}

#[test]
fn enabled_blend_is_bound_for_the_draw_and_undone_by_pop() {
    let (mut ctx, _) = context(64, 64);
    ctx.state_push();
    ctx.enable(Capabilities::BLEND);
    ctx.blend_func(BlendFactor::One, BlendFactor::One);
    triangle(&mut ctx);
    let blend = recorder(&ctx).draws()[0].blend.expect("blend bound");
    assert!(blend.enabled);
    assert_eq!((blend.src, blend.dst), (BlendFactor::One, BlendFactor::One));

    ctx.state_pop();
    assert!(!ctx.capabilities().contains(Capabilities::BLEND));
    assert!(!recorder(&ctx).bound_blend().expect("blend bound").enabled);
}

#[test]
fn balanced_stacks_restore_their_tops() {
    let (mut ctx, _) = context(64, 64);
    ctx.rotate(10.0, 20.0, 30.0);
    let model = ctx.model_matrix();
    let caps = ctx.capabilities();
    for _ in 0..4 {
        ctx.push();
        ctx.translate(1.0, 2.0, 3.0);
        ctx.state_push();
        ctx.enable(Capabilities::BLUR | Capabilities::CULL);
    }
    for _ in 0..4 {
        ctx.pop();
        ctx.state_pop();
    }
    assert_eq!(ctx.model_matrix(), model);
    assert_eq!(ctx.capabilities(), caps);
}

#[test]
fn batch_on_a_full_state_stack_keeps_the_callers_layer() {
    let config = EmberConfig { stack_capacity: 4, ..EmberConfig::default() };
    let (mut ctx, _) = context_with(config, 64, 64);
    for _ in 0..3 {
        ctx.state_push();
    }
    ctx.enable(Capabilities::BLEND);
    assert_eq!(ctx.state_depth(), 3);

    triangle(&mut ctx);
    assert_eq!(recorder(&ctx).draw_count(), 1);
    assert_eq!(ctx.state_depth(), 3);
    assert!(ctx.capabilities().contains(Capabilities::BLEND));
    assert!(recorder(&ctx).bound_blend().expect("blend bound").enabled);
}

#[test]
fn alpha_test_selects_program_variant() {
    let (mut ctx, _) = context(64, 64);
    ctx.enable(Capabilities::ALPHA_TEST);
    ctx.alpha_func(CompareFunc::Greater, 1.5);
    triangle(&mut ctx);
    let draw = &recorder(&ctx).draws()[0];
    assert_eq!(
        draw.programs,
        Some((ProgramKind::GeometryVertex, ProgramKind::GeometryPixel(Some(CompareFunc::Greater))))
    );
    let object: ObjectUniform = bytemuck::pod_read_unaligned(&draw.constants[&0]);
    assert_eq!(object.alpha_ref, 1.0);
}

#[test]
fn lighting_flag_reaches_object_constants() {
    let (mut ctx, _) = context(64, 64);
    ctx.enable(Capabilities::LIGHTING);
    triangle(&mut ctx);
    ctx.disable(Capabilities::LIGHTING);
    triangle(&mut ctx);
    let draws = recorder(&ctx).draws();
    let flags: Vec<u32> = draws
        .iter()
        .map(|d| bytemuck::pod_read_unaligned::<ObjectUniform>(&d.constants[&0]).flags)
        .collect();
    assert_eq!(flags, vec![OBJECT_FLAG_LIGHTING, 0]);
}

#[test]
fn omni_light_draws_full_screen_quad_per_position() {
    let (mut ctx, _) = context(64, 64);
    ctx.translate(1.0, 2.0, 3.0);
    ctx.radius(5.0);
    ctx.multiply(2.0);
    ctx.color3(1.0, 0.5, 0.25);
    ctx.begin(Topology::Omnis);
    assert_eq!(ctx.current_pass(), Some(Pass::Omni));
    ctx.position3(0.0, 0.0, 0.0);
    ctx.position3(1.0, 0.0, 0.0);
    ctx.end();

    let draws = recorder(&ctx).draws();
    assert_eq!(draws.len(), 2);
    let draw = &draws[0];
    assert_eq!(draw.vertex_count, 6);
    assert_eq!(draw.programs, Some((ProgramKind::FullScreenVertex, ProgramKind::OmniPixel)));
    assert_eq!(draw.blend, Some(BlendDesc::ADDITIVE));
    assert_eq!(draw.targets.len(), 1);
    assert!(draw.resources.iter().all(Option::is_some));
    let light: LightUniform = bytemuck::pod_read_unaligned(&draw.constants[&1]);
    assert_eq!(light.position, [1.0, 2.0, 3.0]);
    assert_eq!(light.radius, 5.0);
    assert_eq!(light.multiplier, 2.0);
    assert_eq!(light.color, [1.0, 0.5, 0.25]);
    let second: LightUniform = bytemuck::pod_read_unaligned(&draws[1].constants[&1]);
    assert_eq!(second.position, [2.0, 2.0, 3.0]);
}

#[test]
fn ambient_light_uses_ambient_program() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Ambients);
    ctx.position2(0.0, 0.0);
    ctx.end();
    let draw = &recorder(&ctx).draws()[0];
    assert_eq!(draw.programs, Some((ProgramKind::FullScreenVertex, ProgramKind::AmbientPixel)));
}

#[test]
fn geometry_after_lighting_rebinds_its_state() {
    let (mut ctx, _) = context(64, 64);
    triangle(&mut ctx);
    ctx.begin(Topology::Ambients);
    ctx.position2(0.0, 0.0);
    ctx.end();
    triangle(&mut ctx);
    let draws = recorder(&ctx).draws();
    assert_eq!(draws[2].blend, draws[0].blend);
    assert_eq!(draws[2].programs, draws[0].programs);
    assert_eq!(draws[2].targets.len(), 5);
}

fn back_buffer_blends(ctx: &ember_renderer::Context) -> Vec<BlendDesc> {
    recorder(ctx)
        .draws()
        .iter()
        .filter(|d| d.targets == [RenderTarget::BackBuffer])
        .filter_map(|d| d.blend)
        .collect()
}

#[test]
fn second_post_process_composites_additively() {
    let (mut ctx, _) = context(64, 64);
    ctx.post_process();
    ctx.post_process();
    assert_eq!(back_buffer_blends(&ctx), vec![BlendDesc::OPAQUE, BlendDesc::ADDITIVE]);

    ctx.swap();
    recorder_mut(&mut ctx).clear_log();
    ctx.post_process();
    assert_eq!(back_buffer_blends(&ctx), vec![BlendDesc::OPAQUE]);
}

#[test]
fn blur_spread_twenty_lands_on_level_two() {
    let (mut ctx, _) = context(800, 600);
    ctx.enable(Capabilities::BLUR);
    ctx.blur(20.0);
    ctx.post_process();
    ctx.swap();

    assert_eq!(ctx.last_blur_level(), Some(2));
    let exec = recorder(&ctx);
    // copy to level 0, two downsamples, horizontal, vertical, composite
    assert_eq!(exec.draw_count(), 6);
    assert_eq!(exec.draws()[5].targets, vec![RenderTarget::BackBuffer]);
}

#[test]
fn hdr_tone_maps_onto_back_buffer() {
    let (mut ctx, _) = context(64, 64);
    ctx.enable(Capabilities::HDR);
    ctx.post_process();
    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 1);
    let draw = &exec.draws()[0];
    assert_eq!(draw.programs, Some((ProgramKind::FullScreenVertex, ProgramKind::ToneMapPixel)));
    assert_eq!(draw.targets, vec![RenderTarget::BackBuffer]);
    assert!(draw.resources[1].is_some());
}

#[test]
fn bloom_extracts_and_blurs_before_tone_mapping() {
    let (mut ctx, _) = context(256, 256);
    ctx.enable(Capabilities::HDR | Capabilities::BLOOM);
    ctx.post_process();
    let exec = recorder(&ctx);
    let pixels: Vec<ProgramKind> = exec.draws().iter().filter_map(|d| d.programs.map(|p| p.1)).collect();
    assert_eq!(pixels.first(), Some(&ProgramKind::LdrSubtractPixel));
    assert_eq!(pixels.last(), Some(&ProgramKind::ToneMapPixel));
    assert!(pixels.contains(&ProgramKind::BlurHorizontalPixel));
    assert!(pixels.contains(&ProgramKind::BlurVerticalPixel));
    // bloom spread 16 from level 1 settles on level 2
    assert_eq!(ctx.last_blur_level(), Some(2));
}

#[test]
fn post_process_mid_batch_is_rejected() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Points);
    recorder_mut(&mut ctx).clear_log();
    ctx.post_process();
    assert_eq!(recorder(&ctx).count(|c| matches!(c, Call::Draw { .. })), 0);
    ctx.end();
    assert!(ctx.error().is_some());
}
