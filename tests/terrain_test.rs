mod common;

use approx::assert_relative_eq;
use scene_ngin::data_structures::{
    basis::Basis,
    terrain::{GroundProbe, TerrainGenerator, TerrainOptions, TerrainSurface},
    vector::{Vec2, Vec3},
};

use crate::common::test_utils::Ramp;

fn samples() -> impl Iterator<Item = f64> {
    (0..100).map(|i| i as f64 * 7.3 - 300.0)
}

#[test]
fn road_centerline_is_damped() {
    let generator = TerrainGenerator::new(TerrainOptions::default());
    for z in samples() {
        let center = generator.get_road(z);
        let raw = generator.raw_height(center);
        assert_relative_eq!(generator.height(center), raw * 0.2, epsilon = 1e-9);
    }
}

#[test]
fn far_from_the_road_height_is_raw() {
    let generator = TerrainGenerator::new(TerrainOptions::default());
    for z in samples() {
        let off_road = generator.get_road(z) + Vec2::new(60.0, 0.0);
        assert_relative_eq!(
            generator.height(off_road),
            generator.raw_height(off_road),
            epsilon = 1e-12
        );
    }
}

#[test]
fn road_is_lower_than_its_surroundings_on_average() {
    let generator = TerrainGenerator::new(TerrainOptions::default());
    let (mut on_road, mut off_road) = (0.0, 0.0);
    for z in samples() {
        let center = generator.get_road(z);
        on_road += generator.height_at(center.x, z);
        off_road += generator.height_at(center.x + 20.0, z);
    }
    assert!(on_road < off_road, "{on_road} >= {off_road}");
}

#[test]
fn generation_is_deterministic() {
    let a = TerrainGenerator::new(TerrainOptions::default());
    let b = TerrainGenerator::new(TerrainOptions::default());
    let reseeded = TerrainGenerator::new(TerrainOptions::default().with_seed(7.0));
    let mut differs = false;
    for z in samples() {
        let p = Vec2::new(z * 0.37, z);
        assert_eq!(a.height(p), b.height(p));
        differs |= a.raw_height(p) != reseeded.raw_height(p);
    }
    assert!(differs);
}

#[test]
fn no_damping_keeps_the_road_at_raw_height() {
    let generator = TerrainGenerator::new(TerrainOptions::default().with_road_damping(1.0));
    let center = generator.get_road(12.0);
    assert_relative_eq!(generator.height(center), generator.raw_height(center), epsilon = 1e-12);
}

#[test]
fn road_forward_follows_the_centerline() {
    let generator = TerrainGenerator::new(TerrainOptions::default());
    for z in samples() {
        let forward = generator.get_forward(z);
        assert_relative_eq!(forward.y, 0.0);
        assert!(forward.z < 0.0);
        let surface_forward = generator.road_forward(z);
        assert!(surface_forward.z < 0.0);
    }
}

#[test]
fn probes_follow_a_ramp() {
    let ramp = Ramp { slope: 0.5 };
    let probe = GroundProbe::default();
    let basis = Basis::IDENTITY;

    let contact = probe.probe(&ramp, Vec3::new(2.0, 0.5, 0.0), &basis, Vec3::new(0.0, -1.0, 0.0));
    assert_relative_eq!(contact.height, 1.0, epsilon = 1e-9);
    assert!(contact.on_ground);
    let expected = Vec3::new(-0.5, 1.0, 0.0) / (1.25f64).sqrt();
    assert_relative_eq!(contact.normal, expected, epsilon = 1e-9);
    assert_relative_eq!(ramp.normal_at(2.0, 0.0), expected, epsilon = 1e-9);

    let mut position = Vec3::new(2.0, 0.5, 0.0);
    let mut velocity = Vec3::new(0.0, -1.0, 0.0);
    probe.step(&ramp, &mut position, &mut velocity, &basis, 0.1);
    assert_relative_eq!(position.y, 1.0, epsilon = 1e-9);
    assert_eq!(velocity.y, -1.0);
}
