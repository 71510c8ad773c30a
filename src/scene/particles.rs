use super::morph::Morph;
use super::{PARTICLE_COUNT, TREE_BASE_RADIUS, TREE_HEIGHT};
use crate::config::MotionConfig;
use crate::gesture::Gesture;
use crate::store::InteractionState;
use glam::Vec3;
use palette::Srgb;
use rand::Rng;
use std::f32::consts::TAU;

const GOLD: Srgb<u8> = Srgb::new(0xFF, 0xD7, 0x00);
const DARK_GREEN: Srgb<u8> = Srgb::new(0x00, 0x64, 0x00);
const FOREST_GREEN: Srgb<u8> = Srgb::new(0x22, 0x8B, 0x22);
const LIME_GREEN: Srgb<u8> = Srgb::new(0x32, 0xCD, 0x32);
const RED: Srgb<u8> = Srgb::new(0xFF, 0x00, 0x00);
const SNOW: Srgb<u8> = Srgb::new(0xFF, 0xFF, 0xFF);

const PALETTE: [Srgb<u8>; 6] = [GOLD, DARK_GREEN, FOREST_GREEN, LIME_GREEN, RED, SNOW];
const GREENS: [Srgb<u8>; 3] = [DARK_GREEN, FOREST_GREEN, LIME_GREEN];

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub tree: Vec3,
    pub scatter: Vec3,
    pub color: Srgb<f32>,
    pub size: f32,
}

impl Particle {
    pub fn random(rng: &mut impl Rng) -> Self {
        // dense cone, evenly spread across each horizontal slice
        let h = rng.random::<f32>() * TREE_HEIGHT;
        let base = TREE_BASE_RADIUS * (1.0 - h / TREE_HEIGHT);
        let r = base * rng.random::<f32>().sqrt();
        let angle = rng.random::<f32>() * TAU;
        let tree = Vec3::new(angle.cos() * r, h - TREE_HEIGHT / 2.0, angle.sin() * r);

        // spherical shell far behind the scene
        let theta = rng.random::<f32>() * TAU;
        let phi = (rng.random::<f32>() * 2.0 - 1.0).acos();
        let radius = 15.0 + rng.random::<f32>() * 20.0;
        let scatter = Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
        );

        let color = if rng.random::<f32>() > 0.3 {
            GREENS[rng.random_range(0..GREENS.len())]
        } else {
            PALETTE[rng.random_range(0..PALETTE.len())]
        };

        Self {
            tree,
            scatter,
            color: color.into_format(),
            size: rng.random::<f32>() * 1.5 + 0.5,
        }
    }
}

/// Values the particle shader consumes every frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticleUniforms {
    pub time: f32,
    /// 0 = scattered, 1 = tree.
    pub morph: f32,
}

pub struct ParticleField {
    pub particles: Vec<Particle>,
    morph: Morph<f32>,
    elapsed: f32,
}

impl ParticleField {
    pub fn new(rng: &mut impl Rng) -> Self {
        Self::with_count(PARTICLE_COUNT, rng)
    }

    pub fn with_count(count: usize, rng: &mut impl Rng) -> Self {
        Self {
            particles: (0..count).map(|_| Particle::random(rng)).collect(),
            morph: Morph::new(0.0),
            elapsed: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32, state: &InteractionState, motion: &MotionConfig) {
        // an ambiguous hand keeps whatever shape was last requested
        match state.gesture {
            Gesture::Fist => self.morph.set_target(1.0),
            Gesture::OpenPalm | Gesture::Pinch => self.morph.set_target(0.0),
            Gesture::None => {}
        }
        self.morph.advance(motion.particle_rate, dt, motion.timing);
        self.elapsed += dt;
    }

    pub fn uniforms(&self) -> ParticleUniforms {
        ParticleUniforms {
            time: self.elapsed,
            morph: self.morph.value(),
        }
    }

    pub fn target(&self) -> f32 {
        self.morph.target
    }

    pub fn blended_position(&self, index: usize) -> Option<Vec3> {
        self.particles
            .get(index)
            .map(|p| p.scatter.lerp(p.tree, self.morph.value()))
    }
}
