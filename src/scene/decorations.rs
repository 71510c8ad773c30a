use super::morph::Morph;
use super::{EMBLEM_AWAY, EMBLEM_TREE, ORNAMENT_COUNT, TREE_HEIGHT, Transform};
use crate::config::MotionConfig;
use crate::store::InteractionState;
use glam::{EulerRot, Quat, Vec3};
use rand::Rng;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy)]
pub struct Ornament {
    pub tree: Vec3,
    pub scatter: Vec3,
    pub scale: f32,
    position: Morph<Vec3>,
}

impl Ornament {
    fn random(index: usize, count: usize, rng: &mut impl Rng) -> Self {
        // spiral wound up the tree
        let height = index as f32 / count as f32;
        let radius = 3.8 * (1.0 - height) + 0.2;
        let angle = index as f32 * 0.4 + rng.random::<f32>() * 0.5;
        let tree = Vec3::new(
            angle.cos() * radius,
            height * TREE_HEIGHT - TREE_HEIGHT / 2.0,
            angle.sin() * radius,
        );

        let ring_angle = rng.random::<f32>() * TAU;
        let ring_radius = 10.0 + rng.random::<f32>() * 10.0;
        let scatter = Vec3::new(
            ring_angle.cos() * ring_radius,
            (rng.random::<f32>() - 0.5) * 12.0,
            ring_angle.sin() * ring_radius,
        );

        Self {
            tree,
            scatter,
            scale: rng.random::<f32>() * 0.5 + 0.2,
            position: Morph::new(scatter),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position.value()
    }
}

pub struct Ornaments {
    pub items: Vec<Ornament>,
    elapsed: f32,
}

impl Ornaments {
    pub fn new(rng: &mut impl Rng) -> Self {
        Self {
            items: (0..ORNAMENT_COUNT)
                .map(|i| Ornament::random(i, ORNAMENT_COUNT, rng))
                .collect(),
            elapsed: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32, state: &InteractionState, motion: &MotionConfig) {
        let tree = state.is_tree_mode();
        for ornament in &mut self.items {
            let target = if tree { ornament.tree } else { ornament.scatter };
            ornament.position.set_target(target);
            ornament.position.advance(motion.ornament_rate, dt, motion.timing);
        }
        self.elapsed += dt;
    }

    pub fn transforms(&self) -> Vec<Transform> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let pulse = (self.elapsed * 2.0 + i as f32).sin() * 0.1 + 1.0;
                Transform::new(o.position(), Quat::IDENTITY, o.scale * pulse)
            })
            .collect()
    }
}

/// The star that crowns the tree and drifts away when the tree dissolves.
pub struct Emblem {
    position: Morph<Vec3>,
    spin: f32,
    elapsed: f32,
}

impl Default for Emblem {
    fn default() -> Self {
        Self {
            position: Morph::new(EMBLEM_AWAY),
            spin: 0.0,
            elapsed: 0.0,
        }
    }
}

impl Emblem {
    pub fn update(&mut self, dt: f32, state: &InteractionState, motion: &MotionConfig) {
        let target = if state.is_tree_mode() {
            EMBLEM_TREE
        } else {
            EMBLEM_AWAY
        };
        self.position.set_target(target);
        self.position.advance(motion.emblem_rate, dt, motion.timing);
        self.spin = (self.spin + dt) % TAU;
        self.elapsed += dt;
    }

    pub fn position(&self) -> Vec3 {
        self.position.value()
    }

    pub fn transform(&self) -> Transform {
        let wobble = self.elapsed.sin() * 0.2;
        let rotation = Quat::from_euler(EulerRot::XYZ, 0.0, self.spin, wobble);
        let scale = 1.0 + (self.elapsed * 4.0).sin() * 0.3;
        Transform::new(self.position(), rotation, scale)
    }
}
