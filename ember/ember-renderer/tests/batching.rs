mod common;

use common::{context, context_with, ids, recorder, recorder_mut, vertices};
use ember_renderer::{Capabilities, EmberConfig, Pass, Topology};
use render_api::{Call, PrimitiveTopology};

#[test]
fn screen_triangle_draws_once_with_default_diffuse() {
    let (mut ctx, _) = context(800, 600);
    ctx.set_2d_view_proj(-999.0, 999.0);
    ctx.begin(Topology::Triangles);
    ctx.position2(0.0, 0.0);
    ctx.position2(800.0, 0.0);
    ctx.position2(0.0, 600.0);
    ctx.end();

    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 1);
    let draw = &exec.draws()[0];
    assert_eq!(draw.vertex_count, 3);
    assert_eq!(vertices(draw).len(), 3);
    assert_eq!(draw.topology, Some(PrimitiveTopology::TriangleList));
    let diffuse = draw.resources[0].expect("diffuse bound");
    assert_eq!(exec.texture_levels(diffuse).unwrap()[0], vec![255, 255, 255, 255]);
    assert!(ctx.error().is_none());
}

#[test]
fn quads_upload_six_vertices_in_corner_order() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Quads);
    for i in 0..4 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();

    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 1);
    assert_eq!(ids(&exec.draws()[0]), vec![0, 1, 2, 0, 2, 3]);
}

#[test]
fn fan_expands_around_first_vertex() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::TriangleFan);
    for i in 0..5 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
    assert_eq!(ids(&recorder(&ctx).draws()[0]), vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
}

#[test]
fn quad_strip_expands_pairs() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::QuadStrip);
    for i in 0..6 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
    let drawn = ids(&recorder(&ctx).draws()[0]);
    assert_eq!(drawn.len(), 12);
    assert_eq!(&drawn[..6], &[0, 1, 2, 0, 2, 3]);
}

#[test]
fn capacity_overflow_splits_into_two_draws() {
    let (mut ctx, _) = context(64, 64);
    let capacity = ctx.config().batch_capacity;
    ctx.begin(Topology::Triangles);
    for i in 0..=capacity {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();

    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 2);
    let first = ids(&exec.draws()[0]);
    let second = ids(&exec.draws()[1]);
    assert_eq!(first.len() + second.len(), capacity + 1);
    assert_eq!(first.len() % 3, 0);
    let all: Vec<usize> = first.into_iter().chain(second).collect();
    assert_eq!(all, (0..=capacity).collect::<Vec<_>>());
}

#[test]
fn triangle_strip_carries_its_edge_across_flushes() {
    let config = EmberConfig { batch_capacity: 16, ..EmberConfig::default() };
    let (mut ctx, _) = context_with(config, 64, 64);
    ctx.begin(Topology::TriangleStrip);
    for i in 0..20 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();

    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 2);
    assert_eq!(ids(&exec.draws()[0]), (0..16).collect::<Vec<_>>());
    assert_eq!(ids(&exec.draws()[1]), (14..20).collect::<Vec<_>>());
}

fn drawn_ids(config: EmberConfig, topology: Topology, count: usize) -> Vec<Vec<usize>> {
    let (mut ctx, _) = context_with(config, 64, 64);
    ctx.begin(topology);
    for i in 0..count {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
    recorder(&ctx).draws().iter().map(ids).collect()
}

#[test]
fn expanded_topologies_keep_order_across_flushes() {
    let small = EmberConfig { batch_capacity: 16, ..EmberConfig::default() };
    for topology in [Topology::TriangleFan, Topology::Quads, Topology::QuadStrip] {
        let whole = drawn_ids(EmberConfig::default(), topology, 12);
        assert_eq!(whole.len(), 1, "{topology:?}");
        let split = drawn_ids(small.clone(), topology, 12);
        assert_eq!(split.len(), 2, "{topology:?}");
        assert!(split.iter().all(|d| d.len() % 3 == 0), "{topology:?}");
        assert_eq!(split.concat(), whole[0], "{topology:?}");
    }
    let fan = drawn_ids(small, Topology::TriangleFan, 12).concat();
    assert_eq!(&fan[..6], &[0, 1, 2, 0, 2, 3]);
    assert_eq!(&fan[fan.len() - 3..], &[0, 10, 11]);
}

#[test]
fn line_strip_keeps_last_vertex_across_flushes() {
    let config = EmberConfig { batch_capacity: 16, ..EmberConfig::default() };
    let (mut ctx, _) = context_with(config, 64, 64);
    ctx.begin(Topology::LineStrip);
    for i in 0..18 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();

    let exec = recorder(&ctx);
    assert_eq!(ids(&exec.draws()[0]), (0..16).collect::<Vec<_>>());
    assert_eq!(ids(&exec.draws()[1]), vec![15, 16, 17]);
}

#[test]
fn line_loop_closes_on_first_vertex() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::LineLoop);
    for i in 1..4 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();

    let draw = &recorder(&ctx).draws()[0];
    assert_eq!(draw.topology, Some(PrimitiveTopology::LineStrip));
    assert_eq!(ids(draw), vec![1, 2, 3, 1]);
}

#[test]
fn empty_span_draws_nothing() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Triangles);
    ctx.end();
    assert_eq!(recorder(&ctx).draw_count(), 0);
    assert!(!ctx.batch_open());
}

#[test]
fn nested_begin_is_rejected() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Triangles);
    ctx.begin(Topology::Lines);
    assert!(ctx.error().is_some());
    for i in 0..3 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
    assert_eq!(recorder(&ctx).draws()[0].topology, Some(PrimitiveTopology::TriangleList));
    assert_eq!(ctx.state_depth(), 0);
}

#[test]
fn position_outside_batch_is_ignored() {
    let (mut ctx, _) = context(64, 64);
    ctx.position3(1.0, 2.0, 3.0);
    assert_eq!(recorder(&ctx).draw_count(), 0);
}

#[test]
fn vertex_attributes_follow_current_values() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Points);
    ctx.color4(0.1, 0.2, 0.3, 0.4);
    ctx.tex_coord(0.5, 0.75);
    ctx.normal(0.0, 1.0, 0.0);
    ctx.position3(1.0, 2.0, 3.0);
    ctx.color3(1.0, 0.0, 0.0);
    ctx.position2(4.0, 5.0);
    ctx.end();

    let drawn = vertices(&recorder(&ctx).draws()[0]);
    assert_eq!(drawn[0].color, [0.1, 0.2, 0.3, 0.4]);
    assert_eq!(drawn[0].texcoord, [0.5, 0.75]);
    assert_eq!(drawn[0].normal, [0.0, 1.0, 0.0]);
    assert_eq!(drawn[0].position, [1.0, 2.0, 3.0]);
    assert_eq!(drawn[1].color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(drawn[1].position, [4.0, 5.0, 0.0]);
}

#[test]
fn generated_tangents_reach_the_gpu() {
    let (mut ctx, _) = context(64, 64);
    ctx.enable(Capabilities::GENERATE_TANGENT_BINORMAL);
    ctx.begin(Topology::Triangles);
    ctx.tangent(0.0, 0.0, 1.0);
    ctx.tex_coord(0.0, 0.0);
    ctx.position3(0.0, 0.0, 0.0);
    ctx.tex_coord(1.0, 0.0);
    ctx.position3(2.0, 0.0, 0.0);
    ctx.tex_coord(0.0, 1.0);
    ctx.position3(0.0, 2.0, 0.0);
    ctx.end();

    for v in vertices(&recorder(&ctx).draws()[0]) {
        assert_eq!(v.tangent, [2.0, 0.0, 0.0]);
        assert_eq!(v.binormal, [0.0, 2.0, 0.0]);
    }
}

#[test]
fn repeated_pass_entry_binds_targets_once() {
    let (mut ctx, _) = context(64, 64);
    recorder_mut(&mut ctx).clear_log();
    for _ in 0..2 {
        ctx.begin(Topology::Triangles);
        for i in 0..3 {
            ctx.position3(i as f32, 0.0, 0.0);
        }
        ctx.end();
    }
    let exec = recorder(&ctx);
    assert_eq!(exec.draw_count(), 2);
    assert_eq!(exec.count(|c| matches!(c, Call::BindRenderTargets { .. })), 1);
    assert_eq!(ctx.current_pass(), Some(Pass::Geometry));
}

#[test]
fn geometry_pass_writes_gbuffer_and_accumulation() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Points);
    ctx.position3(0.0, 0.0, 0.0);
    ctx.end();
    let draw = &recorder(&ctx).draws()[0];
    assert_eq!(draw.targets.len(), 5);
    assert!(draw.depth_attached);
}

#[test]
fn reserved_topologies_discard_positions() {
    let (mut ctx, _) = context(64, 64);
    for topology in [Topology::Spots, Topology::Directionals, Topology::Sprites] {
        ctx.begin(topology);
        ctx.position3(1.0, 1.0, 1.0);
        ctx.end();
    }
    assert_eq!(recorder(&ctx).draw_count(), 0);
    assert_eq!(ctx.current_pass(), Some(Pass::Spot));
    assert!(ctx.error().is_none());
}

// Reserved extension points: accepted, no effect yet.
#[test]
fn reserved_entry_points_are_inert() {
    let (mut ctx, _) = context(64, 64);
    recorder_mut(&mut ctx).clear_log();
    let before = ctx.attributes();
    ctx.begin(Topology::Omnis);
    ctx.target2(1.0, 2.0);
    ctx.target3(1.0, 2.0, 3.0);
    ctx.radius2(1.0, 2.0);
    ctx.falloff_exponent(2.0);
    ctx.specular(1.0, 16.0);
    ctx.self_illum(0.5);
    ctx.end();
    ctx.scissor(0, 0, 8, 8);
    ctx.destroy_texture(1);
    assert_eq!(ctx.attributes(), before);
    assert_eq!(recorder(&ctx).draw_count(), 0);
    assert!(ctx.error().is_none());
}
