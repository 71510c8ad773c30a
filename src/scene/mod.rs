use crate::config::{CarouselConfig, Config, MotionConfig, PhotoUrl};
use crate::gesture::Gesture;
use crate::store::InteractionState;
use glam::{Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub mod cards;
pub mod carousel;
pub mod decorations;
pub mod morph;
pub mod particles;
pub mod view;

pub use cards::{CardContext, CardLayout, CardView, PhotoCard};
pub use carousel::Carousel;
pub use decorations::{Emblem, Ornaments};
pub use particles::{ParticleField, ParticleUniforms};
pub use view::{LogRenderer, Renderer};

pub const PARTICLE_COUNT: usize = 5000;
pub const ORNAMENT_COUNT: usize = 100;
pub const TREE_HEIGHT: f32 = 10.0;
pub const TREE_BASE_RADIUS: f32 = 4.5;

pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 12.0);
pub const LIGHTBOX_POSITION: Vec3 = Vec3::new(0.0, 0.0, 9.5);
pub const EMBLEM_TREE: Vec3 = Vec3::new(0.0, 5.5, 0.0);
pub const EMBLEM_AWAY: Vec3 = Vec3::new(0.0, 15.0, -10.0);
pub const FOCUS_LIFT: Vec3 = Vec3::new(0.0, 0.2, 0.0);

pub const SCALE_RING: f32 = 1.2;
pub const SCALE_TREE: f32 = 0.6;
pub const SCALE_FOCUSED: f32 = 1.6;
pub const SCALE_LIGHTBOX: f32 = 2.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Everything the rendering engine needs for one displayed frame.
#[derive(Debug, Clone)]
pub struct SceneFrame {
    pub gesture: Gesture,
    pub caption: &'static str,
    pub cursor: Vec2,
    pub pinching: bool,
    pub particles: ParticleUniforms,
    pub emblem: Transform,
    pub ornaments: Vec<Transform>,
    /// Rotation of the group that carries the cards.
    pub carousel_rotation: f32,
    pub focused: Option<usize>,
    pub cards: Vec<CardView>,
}

impl SceneFrame {
    pub fn lightbox(&self) -> Option<usize> {
        self.cards
            .iter()
            .position(|c| c.render_order == cards::RENDER_ORDER_LIGHTBOX)
    }
}

pub struct Scene {
    pub particles: ParticleField,
    pub ornaments: Ornaments,
    pub emblem: Emblem,
    pub carousel: Carousel,
    pub cards: Vec<PhotoCard>,
    motion: MotionConfig,
    carousel_config: CarouselConfig,
}

impl Scene {
    pub fn new(config: &Config) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            particles: ParticleField::new(&mut rng),
            ornaments: Ornaments::new(&mut rng),
            emblem: Emblem::default(),
            carousel: Carousel::new(config.cards.len()),
            cards: Self::build_cards(&config.cards, config.carousel.radius),
            motion: config.motion.clone(),
            carousel_config: config.carousel.clone(),
        }
    }

    fn build_cards(urls: &[PhotoUrl], radius: f32) -> Vec<PhotoCard> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| PhotoCard::new(CardLayout::new(url.clone(), i, urls.len(), radius)))
            .collect()
    }

    /// Applies reloaded tunables. The ring is rebuilt only when its layout changed.
    pub fn apply_config(&mut self, config: &Config) {
        self.motion = config.motion.clone();

        let urls: Vec<&PhotoUrl> = self.cards.iter().map(|c| &c.layout.url).collect();
        let same_cards = urls.len() == config.cards.len()
            && urls.iter().zip(&config.cards).all(|(a, b)| *a == b)
            && self.carousel_config.radius == config.carousel.radius;

        if !same_cards {
            log::info!("Rebuilding carousel with {} cards", config.cards.len());
            self.cards = Self::build_cards(&config.cards, config.carousel.radius);
            self.carousel = Carousel::new(config.cards.len());
        }
        self.carousel_config = config.carousel.clone();
    }

    pub fn motion(&self) -> &MotionConfig {
        &self.motion
    }

    pub fn update(&mut self, dt: f32, state: &InteractionState) -> SceneFrame {
        let dt = dt.max(0.0);
        let motion = &self.motion;

        self.particles.update(dt, state, motion);
        self.ornaments.update(dt, state, motion);
        self.emblem.update(dt, state, motion);
        self.carousel.update(dt, state, &self.carousel_config, motion);

        let ctx = CardContext {
            tree_mode: state.is_tree_mode(),
            pinching: state.is_pinching || state.gesture == Gesture::Pinch,
            carousel_rotation: self.carousel.rotation,
        };
        let focused = self.carousel.focused;
        for (i, card) in self.cards.iter_mut().enumerate() {
            card.update(dt, focused == Some(i), &ctx, motion);
        }

        SceneFrame {
            gesture: state.gesture,
            caption: state.gesture.caption(),
            cursor: state.hand_position,
            pinching: state.is_pinching,
            particles: self.particles.uniforms(),
            emblem: self.emblem.transform(),
            ornaments: self.ornaments.transforms(),
            carousel_rotation: self.carousel.rotation,
            focused,
            cards: self.cards.iter().map(PhotoCard::view).collect(),
        }
    }
}
