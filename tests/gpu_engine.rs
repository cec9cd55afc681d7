//! GPU integration tests for fields, constants, and the engine tick.
//!
//! Every test acquires its own headless device and skips cleanly when the
//! machine has no compatible adapter.

use floatfield::{
    Attractor, AttractorParams, Engine, Error, Field, FieldSpec, GpuContext, KernelBuilder, Seed,
};
use glam::Vec3;

/// Headless context, or None (skip) when no adapter is available.
fn init_context() -> Option<GpuContext> {
    match GpuContext::new_blocking() {
        Ok(ctx) => Some(ctx),
        Err(Error::NoAdapter) | Err(Error::Unsupported(_)) => {
            eprintln!("no compatible GPU adapter; skipping test");
            None
        }
        Err(e) => panic!("unexpected context error: {e}"),
    }
}

fn init_engine() -> Option<Engine> {
    init_context().map(Engine::new)
}

fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "element {i}: got {a}, expected {e} (tol {tol})"
        );
    }
}

#[test]
fn seed_survives_upload_and_readback() {
    let Some(mut engine) = init_engine() else { return };
    let seed = vec![1.5, -2.25, 0.0, 100.0, -0.001, 6.674];
    engine
        .register_field("data", FieldSpec::from_data(seed.clone()))
        .unwrap();

    let back = engine.read("data").unwrap();
    assert_close(&back, &seed, 1.0e-3);
}

#[test]
fn fill_seed_covers_every_element() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field(
            "filled",
            FieldSpec {
                seed: Seed::Fill {
                    count: 10,
                    value: 2.5,
                },
                kernel: KernelBuilder::new(),
            },
        )
        .unwrap();

    let back = engine.read("filled").unwrap();
    assert_close(&back, &vec![2.5; 10], 1.0e-4);
}

#[test]
fn identity_kernel_preserves_state_across_ticks() {
    let Some(mut engine) = init_engine() else { return };
    let seed = vec![3.0, -1.0, 0.5, 0.0];
    engine
        .register_field("hold", FieldSpec::from_data(seed.clone()))
        .unwrap();

    for _ in 0..3 {
        engine.tick().unwrap();
    }
    let back = engine.read("hold").unwrap();
    assert_close(&back, &seed, 1.0e-3);
}

#[test]
fn compute_swaps_output_buffers() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field("pp", FieldSpec::from_data(vec![1.0, 2.0, 3.0]))
        .unwrap();

    let mut last = engine.field("pp").unwrap().output_index().unwrap();
    for _ in 0..4 {
        engine.tick().unwrap();
        let now = engine.field("pp").unwrap().output_index().unwrap();
        assert_ne!(now, last, "output must never be the buffer just read");
        last = now;
    }
}

#[test]
fn kernel_reads_previous_step_each_tick() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field(
            "inc",
            FieldSpec {
                seed: Seed::Data(vec![1.0, 2.0, 3.0]),
                kernel: KernelBuilder::new().body("return value + 1.0;"),
            },
        )
        .unwrap();

    engine.tick().unwrap();
    engine.tick().unwrap();
    let back = engine.read("inc").unwrap();
    assert_close(&back, &[3.0, 4.0, 5.0], 1.0e-3);
}

#[test]
fn field_kernel_samples_a_constant() {
    let Some(mut engine) = init_engine() else { return };
    let data = vec![10.0, 20.0, 30.0, 40.0];
    engine.register_constant("rest", &data).unwrap();
    engine
        .register_field(
            "copy",
            FieldSpec {
                seed: Seed::Fill {
                    count: data.len(),
                    value: 0.0,
                },
                kernel: KernelBuilder::new()
                    .texture("rest")
                    .body("return rest(texel);"),
            },
        )
        .unwrap();

    engine.tick().unwrap();
    let back = engine.read("copy").unwrap();
    assert_close(&back, &data, 1.0e-2);
}

#[test]
fn scalar_uniform_feeds_the_kernel() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field(
            "scaled",
            FieldSpec {
                seed: Seed::Data(vec![1.0, 2.0, 4.0]),
                kernel: KernelBuilder::new()
                    .scalar("gain", 2.0)
                    .body("return value * gain;"),
            },
        )
        .unwrap();

    engine.tick().unwrap();
    engine
        .field_mut("scaled")
        .unwrap()
        .set_scalar("gain", 0.5)
        .unwrap();
    engine.tick().unwrap();

    // x2 then x0.5 lands back on the seed.
    let back = engine.read("scaled").unwrap();
    assert_close(&back, &[1.0, 2.0, 4.0], 1.0e-3);
}

/// Three mutually wired fields must land on the same state no matter the
/// registration order: every kernel reads peers from the pre-tick
/// snapshot, never a mid-tick result.
#[test]
fn mutual_wiring_is_order_independent() {
    fn build(order: [&str; 3]) -> Option<Engine> {
        let mut engine = init_engine()?;
        for name in order {
            let (seed, body) = match name {
                "a" => (
                    vec![1.0, -2.0, 3.0, 0.5],
                    "return 0.5 * value + 0.3 * b(texel) - 0.2 * c(texel);",
                ),
                "b" => (
                    vec![0.25, 4.0, -1.0, 2.0],
                    "return 0.8 * value - 0.1 * a(texel) + 0.1 * c(texel);",
                ),
                "c" => (
                    vec![-3.0, 0.75, 1.5, -0.5],
                    "return 0.6 * value + 0.2 * a(texel) + 0.1 * b(texel);",
                ),
                _ => unreachable!(),
            };
            engine
                .register_field(
                    name,
                    FieldSpec {
                        seed: Seed::Data(seed),
                        kernel: KernelBuilder::new().body(body),
                    },
                )
                .unwrap();
        }
        for target in ["a", "b", "c"] {
            for source in ["a", "b", "c"] {
                if target != source {
                    engine.wire(target, source).unwrap();
                }
            }
        }
        Some(engine)
    }

    let Some(mut forward) = build(["a", "b", "c"]) else { return };
    let Some(mut reverse) = build(["c", "b", "a"]) else { return };

    for _ in 0..3 {
        forward.tick().unwrap();
        reverse.tick().unwrap();
    }

    for name in ["a", "b", "c"] {
        let f = forward.read(name).unwrap();
        let r = reverse.read(name).unwrap();
        assert_close(&f, &r, 1.0e-6);
    }
}

/// A cloud seeded at rest with the cursor far away must relax onto its
/// rest positions and stay there.
#[test]
fn attractor_converges_to_rest_fixed_point() {
    let Some(mut engine) = init_engine() else { return };
    let rest = vec![Vec3::new(1.0, 0.0, 0.0)];
    let cloud = Attractor::build(&mut engine, &rest, AttractorParams::default()).unwrap();

    // Zero out the x field so it has to travel back to rest.
    engine.remove("x").unwrap();
    engine
        .register_field(
            "x",
            FieldSpec {
                seed: Seed::Data(vec![0.0]),
                kernel: KernelBuilder::new()
                    .texture("start_x")
                    .vec3("cursor", [0.0; 3])
                    .body(
                        "let rest = start_x(texel);\n\
                         let delta = cursor - vec3<f32>(value, y(texel), z(texel));\n\
                         let dist = max(pow(length(delta), 3.0), 1e-9);\n\
                         let force = clamp(-1.0 * 6.67408 / dist, -5.0, 5.0);\n\
                         let goal = mix(rest, cursor.x, force);\n\
                         return mix(value, goal, 0.03);",
                    ),
            },
        )
        .unwrap();
    engine.wire("x", "y").unwrap();
    engine.wire("x", "z").unwrap();

    cloud.set_cursor(&mut engine, Vec3::new(100.0, 100.0, 100.0));
    for _ in 0..200 {
        engine.tick().unwrap();
    }

    let positions = cloud.positions(&engine).unwrap();
    let p = positions[0];
    assert!(
        (p - rest[0]).length() < 0.02,
        "expected convergence to rest, got {p:?}"
    );

    // Fixed point: staying put once converged.
    for _ in 0..50 {
        engine.tick().unwrap();
    }
    let q = cloud.positions(&engine).unwrap()[0];
    assert!((q - p).length() < 5.0e-3, "drifted from {p:?} to {q:?}");
}

/// Cursor placed exactly on the rest point of a single element seeded at
/// rest: `delta` is exactly zero every tick, the worst case for the
/// `1/|delta|^3` force, and the element must hold its rest position for
/// the full run.
#[test]
fn cursor_coincident_with_rest_holds_the_fixed_point() {
    let Some(mut engine) = init_engine() else { return };
    let rest = vec![Vec3::new(1.0, 0.0, 0.0)];
    let cloud = Attractor::build(&mut engine, &rest, AttractorParams::default()).unwrap();

    cloud.set_cursor(&mut engine, Vec3::new(1.0, 0.0, 0.0));
    for _ in 0..200 {
        engine.tick().unwrap();
    }

    let p = cloud.positions(&engine).unwrap()[0];
    assert!(p.is_finite(), "position diverged to {p:?}");
    assert!(
        (p - rest[0]).length() < 1.0e-3,
        "expected the rest fixed point to hold, got {p:?}"
    );
}

/// Cursor nearly on top of an element: the clamped force must keep the
/// update bounded instead of blowing up on 1/|delta|^3.
#[test]
fn near_singular_cursor_stays_clamped() {
    let Some(mut engine) = init_engine() else { return };
    let rest = vec![Vec3::ZERO];
    let cloud = Attractor::build(&mut engine, &rest, AttractorParams::default()).unwrap();

    cloud.set_cursor(&mut engine, Vec3::new(0.001, 0.0, 0.0));
    for _ in 0..50 {
        engine.tick().unwrap();
        let p = cloud.positions(&engine).unwrap()[0];
        assert!(p.is_finite(), "position diverged to {p:?}");
        // |target| <= max_force * |cursor - rest| per axis keeps the
        // trajectory inside a tight envelope around the origin.
        assert!(
            p.length() < 0.05,
            "clamp failed to bound the force: {p:?}"
        );
    }
}

#[test]
fn disposed_field_rejects_every_operation() {
    let Some(ctx) = init_context() else { return };
    let mut field = Field::new(
        &ctx,
        "doomed",
        FieldSpec {
            seed: Seed::Data(vec![1.0, 2.0]),
            kernel: KernelBuilder::new().body("return value * 2.0;"),
        },
    )
    .unwrap();

    field.compute(&ctx, &floatfield::field::no_inputs).unwrap();
    field.dispose();

    assert!(matches!(
        field.compute(&ctx, &floatfield::field::no_inputs),
        Err(Error::Disposed(_))
    ));
    assert!(matches!(field.read(&ctx), Err(Error::Disposed(_))));
    assert!(matches!(field.output(), Err(Error::Disposed(_))));
    assert!(matches!(
        field.set_vec3("cursor", [0.0; 3]),
        Err(Error::Disposed(_))
    ));

    // Disposing twice is harmless.
    field.dispose();
}

#[test]
fn registry_rejects_duplicates_and_unknown_names() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field("dup", FieldSpec::from_data(vec![1.0]))
        .unwrap();

    assert!(matches!(
        engine.register_field("dup", FieldSpec::from_data(vec![2.0])),
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        engine.register_constant("dup", &[1.0]),
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        engine.wire("dup", "ghost"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        engine.wire("ghost", "dup"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(engine.read("ghost"), Err(Error::NotFound(_))));

    engine.register_constant("k", &[1.0]).unwrap();
    // Constants have no kernel; they cannot be a wiring target.
    assert!(matches!(engine.wire("k", "dup"), Err(Error::NotFound(_))));
}

#[test]
fn removed_entry_is_gone_and_registry_stays_consistent() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field("first", FieldSpec::from_data(vec![1.0]))
        .unwrap();
    engine
        .register_field("second", FieldSpec::from_data(vec![2.0]))
        .unwrap();

    engine.remove("first").unwrap();
    assert!(engine.field("first").is_none());
    assert!(matches!(engine.remove("first"), Err(Error::NotFound(_))));

    // The survivor still ticks and reads correctly.
    engine.tick().unwrap();
    let back = engine.read("second").unwrap();
    assert_close(&back, &[2.0], 1.0e-4);
}

#[test]
fn unresolved_wiring_fails_at_tick() {
    let Some(mut engine) = init_engine() else { return };
    engine
        .register_field(
            "orphan",
            FieldSpec {
                seed: Seed::Data(vec![1.0]),
                kernel: KernelBuilder::new()
                    .texture("missing")
                    .body("return missing(texel);"),
            },
        )
        .unwrap();

    assert!(matches!(engine.tick(), Err(Error::NotFound(_))));
}
