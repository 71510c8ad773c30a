use super::carousel::Carousel;
use super::morph::Morph;
use super::{
    CAMERA_POSITION, FOCUS_LIFT, LIGHTBOX_POSITION, SCALE_FOCUSED, SCALE_LIGHTBOX, SCALE_RING,
    SCALE_TREE, Transform,
};
use crate::config::{MotionConfig, PhotoUrl};
use glam::{EulerRot, Quat, Vec3};

pub const RENDER_ORDER_LIGHTBOX: i32 = 999;
pub const RENDER_ORDER_DEFAULT: i32 = 1;

/// Static placement of one card on the ring and on the tree.
#[derive(Debug, Clone)]
pub struct CardLayout {
    pub url: PhotoUrl,
    pub base_angle: f32,
    pub ring_position: Vec3,
    pub ring_rotation: Quat,
    pub tree_position: Vec3,
}

impl CardLayout {
    pub fn new(url: PhotoUrl, index: usize, count: usize, radius: f32) -> Self {
        let angle = Carousel::base_angle(index, count);

        let height = index as f32 / count.max(1) as f32;
        let tree_radius = 4.0 * (1.0 - height) + 0.5;
        let tree_angle = index as f32 * 0.8;

        Self {
            url,
            base_angle: angle,
            ring_position: Vec3::new(angle.sin() * radius, 0.0, angle.cos() * radius),
            ring_rotation: Quat::from_rotation_y(angle),
            tree_position: Vec3::new(
                tree_angle.cos() * tree_radius,
                height * 8.0 - 4.0,
                tree_angle.sin() * tree_radius,
            ),
        }
    }
}

/// Per-tick inputs shared by every card.
#[derive(Debug, Clone, Copy)]
pub struct CardContext {
    pub tree_mode: bool,
    pub pinching: bool,
    pub carousel_rotation: f32,
}

impl CardContext {
    /// Maps a world-space point into the frame of the spinning ring.
    pub fn to_ring_local(&self, world: Vec3) -> Vec3 {
        Quat::from_rotation_y(-self.carousel_rotation) * world
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub url: PhotoUrl,
    /// Relative to the carousel group.
    pub transform: Transform,
    pub opacity: f32,
    pub highlighted: bool,
    pub render_order: i32,
}

pub struct PhotoCard {
    pub layout: CardLayout,
    position: Morph<Vec3>,
    scale: Morph<f32>,
    rotation: Quat,
    focused: bool,
    lightbox: bool,
    tree_mode: bool,
}

impl PhotoCard {
    pub fn new(layout: CardLayout) -> Self {
        Self {
            layout,
            position: Morph::new(Vec3::ZERO),
            scale: Morph::new(1.0),
            rotation: Quat::IDENTITY,
            focused: false,
            lightbox: false,
            tree_mode: false,
        }
    }

    pub fn update(&mut self, dt: f32, focused: bool, ctx: &CardContext, motion: &MotionConfig) {
        self.focused = focused;
        self.tree_mode = ctx.tree_mode;
        self.lightbox = focused && ctx.pinching && !ctx.tree_mode;

        let (mut target, mut scale) = if ctx.tree_mode {
            (self.layout.tree_position, SCALE_TREE)
        } else {
            (self.layout.ring_position, SCALE_RING)
        };

        if !ctx.tree_mode && focused {
            scale = SCALE_FOCUSED;
            target += FOCUS_LIFT;
        }

        if self.lightbox {
            // pinned in front of the camera however far the ring has turned
            scale = SCALE_LIGHTBOX;
            target = ctx.to_ring_local(LIGHTBOX_POSITION);
        }

        self.position.set_target(target);
        self.scale.set_target(scale);
        let position = self.position.advance(motion.card_rate, dt, motion.timing);
        self.scale.advance(motion.card_rate, dt, motion.timing);

        self.rotation = if self.lightbox {
            look_rotation(position, ctx.to_ring_local(CAMERA_POSITION))
        } else if ctx.tree_mode {
            look_rotation(position, Vec3::new(0.0, target.y, 0.0))
        } else {
            let alpha = motion.timing.alpha(motion.card_turn_rate, dt);
            self.rotation.slerp(self.layout.ring_rotation, alpha)
        };
    }

    pub fn position(&self) -> Vec3 {
        self.position.value()
    }

    pub fn scale(&self) -> f32 {
        self.scale.value()
    }

    pub fn is_lightbox(&self) -> bool {
        self.lightbox
    }

    pub fn view(&self) -> CardView {
        CardView {
            url: self.layout.url.clone(),
            transform: Transform::new(self.position(), self.rotation, self.scale()),
            opacity: if self.focused || self.tree_mode { 1.0 } else { 0.6 },
            highlighted: self.focused && !self.tree_mode,
            render_order: if self.lightbox {
                RENDER_ORDER_LIGHTBOX
            } else {
                RENDER_ORDER_DEFAULT
            },
        }
    }
}

/// Orientation that turns the card's +Z face toward `target`.
pub fn look_rotation(from: Vec3, target: Vec3) -> Quat {
    let d = target - from;
    if d.length_squared() < 1e-10 {
        return Quat::IDENTITY;
    }
    let yaw = d.x.atan2(d.z);
    let pitch = (-d.y).atan2(d.x.hypot(d.z));
    Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const DT: f32 = 1.0 / 60.0;

    fn card(index: usize) -> PhotoCard {
        PhotoCard::new(CardLayout::new(
            PhotoUrl::new(format!("card-{index}")),
            index,
            12,
            7.0,
        ))
    }

    fn run(card: &mut PhotoCard, focused: bool, ctx: CardContext, frames: usize) {
        let motion = MotionConfig::default();
        for _ in 0..frames {
            card.update(DT, focused, &ctx, &motion);
        }
    }

    fn ring(rotation: f32, pinching: bool) -> CardContext {
        CardContext {
            tree_mode: false,
            pinching,
            carousel_rotation: rotation,
        }
    }

    #[test]
    fn test_layout_matches_ring_and_tree() {
        let layout = CardLayout::new(PhotoUrl::new("x"), 3, 12, 7.0);
        assert!((layout.base_angle - FRAC_PI_2).abs() < 1e-6);
        assert!(layout.ring_position.distance(Vec3::new(7.0, 0.0, 0.0)) < 1e-5);
        assert!((layout.tree_position.y - (-2.0)).abs() < 1e-5);

        let top = CardLayout::new(PhotoUrl::new("x"), 0, 12, 7.0);
        assert!(top.tree_position.distance(Vec3::new(4.5, -4.0, 0.0)) < 1e-5);
    }

    #[test]
    fn test_unfocused_card_settles_on_ring() {
        let mut c = card(2);
        run(&mut c, false, ring(0.0, false), 300);

        assert!(c.position().distance(c.layout.ring_position) < 1e-3);
        assert!((c.scale() - SCALE_RING).abs() < 1e-3);
        assert!(c.view().transform.rotation.angle_between(c.layout.ring_rotation) < 1e-2);
        assert_eq!(c.view().opacity, 0.6);
        assert!(!c.view().highlighted);
    }

    #[test]
    fn test_focused_card_lifts_and_grows() {
        let mut c = card(0);
        run(&mut c, true, ring(0.0, false), 300);

        assert!(c.position().distance(c.layout.ring_position + FOCUS_LIFT) < 1e-3);
        assert!((c.scale() - SCALE_FOCUSED).abs() < 1e-3);
        let view = c.view();
        assert!(view.highlighted);
        assert_eq!(view.opacity, 1.0);
        assert_eq!(view.render_order, RENDER_ORDER_DEFAULT);
    }

    #[test]
    fn test_lightbox_is_fixed_in_world_space() {
        for rotation in [0.0, 1.3, -4.0, 20.0] {
            let mut c = card(5);
            let ctx = ring(rotation, true);
            run(&mut c, true, ctx, 300);

            let world = Quat::from_rotation_y(rotation) * c.position();
            assert!(world.distance(LIGHTBOX_POSITION) < 1e-3, "rot {rotation}: {world}");
            assert!((c.scale() - SCALE_LIGHTBOX).abs() < 1e-3);
            assert!(c.is_lightbox());
            assert_eq!(c.view().render_order, RENDER_ORDER_LIGHTBOX);

            // the face points at the camera in world space
            let facing = Quat::from_rotation_y(rotation) * c.view().transform.rotation * Vec3::Z;
            let to_camera = (CAMERA_POSITION - world).normalize();
            assert!(facing.dot(to_camera) > 0.999, "rot {rotation}");
        }
    }

    #[test]
    fn test_pinch_without_focus_stays_on_ring() {
        let mut c = card(4);
        run(&mut c, false, ring(0.7, true), 300);
        assert!(!c.is_lightbox());
        assert!(c.position().distance(c.layout.ring_position) < 1e-3);
    }

    #[test]
    fn test_tree_mode_faces_trunk() {
        let mut c = card(6);
        let ctx = CardContext {
            tree_mode: true,
            pinching: false,
            carousel_rotation: 0.0,
        };
        run(&mut c, true, ctx, 300);

        assert!(c.position().distance(c.layout.tree_position) < 1e-3);
        assert!((c.scale() - SCALE_TREE).abs() < 1e-3);
        let view = c.view();
        assert!(!view.highlighted);
        assert_eq!(view.opacity, 1.0);

        let facing = view.transform.rotation * Vec3::Z;
        let p = c.position();
        let to_trunk = (Vec3::new(0.0, p.y, 0.0) - p).normalize();
        assert!(facing.dot(to_trunk) > 0.999);
    }

    #[test]
    fn test_look_rotation_points_z_at_target() {
        let cases = [
            (Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0)),
            (Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)),
            (Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 6.0, -1.0)),
            (Vec3::ZERO, Vec3::new(0.0, -2.0, 0.5)),
        ];
        for (from, to) in cases {
            let facing = look_rotation(from, to) * Vec3::Z;
            assert!(facing.dot((to - from).normalize()) > 0.9999, "{from} -> {to}");
        }
        assert_eq!(look_rotation(Vec3::ONE, Vec3::ONE), Quat::IDENTITY);
    }
}
