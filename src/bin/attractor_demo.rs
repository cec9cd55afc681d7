//! Headless attractor run: seeds a particle cloud on a sphere, orbits a
//! cursor through it, and logs decoded positions. Stands in for the
//! windowed renderer when eyeballing simulation behavior.

use glam::Vec3;

use floatfield::{sphere_surface, Attractor, AttractorParams, Engine, GpuContext};

const PARTICLES: usize = 1000;
const RADIUS: f32 = 3.5;
const TICKS: usize = 600;
const REPORT_EVERY: usize = 60;

fn main() -> floatfield::Result<()> {
    env_logger::init();

    let ctx = GpuContext::new_blocking()?;
    let mut engine = Engine::new(ctx);

    let seed = sphere_surface(PARTICLES, RADIUS);
    let cloud = Attractor::build(&mut engine, &seed, AttractorParams::default())?;

    for tick in 0..TICKS {
        let t = tick as f32 * 0.02;
        let cursor = Vec3::new(t.cos(), (t * 0.7).sin() * 0.5, t.sin()) * RADIUS * 0.6;
        cloud.set_cursor(&mut engine, cursor);
        engine.tick()?;

        if tick % REPORT_EVERY == 0 {
            let positions = cloud.positions(&engine)?;
            let centroid =
                positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
            let spread = positions
                .iter()
                .map(|p| (*p - centroid).length())
                .fold(0.0f32, f32::max);
            log::info!(
                "tick {tick:4}  cursor ({:+.2} {:+.2} {:+.2})  centroid ({:+.3} {:+.3} {:+.3})  spread {spread:.3}",
                cursor.x, cursor.y, cursor.z, centroid.x, centroid.y, centroid.z,
            );
        }
    }

    Ok(())
}
