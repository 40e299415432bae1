//! Course simulation: scrolling platforms and the bouncing player.
//!
//! Everything here is plain CPU state; the game copies positions into its entities
//! after each step.

use glam::Vec3;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::CourseConfig;

/// Held steering keys for one step.
#[derive(Clone, Copy, Debug, Default)]
pub struct Controls {
    pub left: bool,
    pub right: bool,
}

/// What happened during one [`Course::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepOutcome {
    /// Player position at the moment of a successful landing.
    pub landed: Option<Vec3>,
    /// The player dropped below the landing height without a platform under it.
    pub fell: bool,
}

/// Speed multiplier for a score. A step applies once the score is strictly above
/// its threshold, and the highest passed threshold wins regardless of list order.
/// With no step passed the multiplier is 1.
pub fn multiplier(steps: &[(u32, f32)], score: u32) -> f32 {
    steps
        .iter()
        .filter(|(threshold, _)| score > *threshold)
        .max_by_key(|(threshold, _)| *threshold)
        .map(|(_, value)| *value)
        .unwrap_or(1.0)
}

/// Whether two closed x intervals `[a - ha, a + ha]` and `[b - hb, b + hb]` touch.
pub fn overlaps(a: f32, half_a: f32, b: f32, half_b: f32) -> bool {
    a - half_a <= b + half_b && a + half_a >= b - half_b
}

#[derive(Clone, Debug)]
pub struct Course {
    config: CourseConfig,
    platforms: Vec<Vec3>,
    player: Vec3,
    vertical_speed: f32,
    score: u32,
    platform_count: usize,
    paused: bool,
}

impl Course {
    pub fn new(config: CourseConfig) -> Self {
        let mut course = Self {
            platforms: Vec::new(),
            player: Vec3::ZERO,
            vertical_speed: 0.0,
            score: 0,
            platform_count: 0,
            paused: false,
            config,
        };
        course.reset();
        course
    }

    /// Put platforms and player back at their starting positions and zero the score.
    pub fn reset(&mut self) {
        let y = self.config.platform_y;
        self.platforms = self
            .config
            .platform_start_z
            .iter()
            .map(|&z| Vec3::new(0.0, y, z))
            .collect();
        self.player = Vec3::from_array(self.config.player_start);
        self.vertical_speed = self.config.launch_speed;
        self.score = 0;
        self.platform_count = self.config.first_target;
        self.paused = false;
    }

    pub fn config(&self) -> &CourseConfig {
        &self.config
    }

    pub fn platforms(&self) -> &[Vec3] {
        &self.platforms
    }

    pub fn player(&self) -> Vec3 {
        self.player
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("{}", if self.paused { "Paused" } else { "Resumed" });
    }

    /// Index of the platform the next landing is checked against.
    pub fn target_index(&self) -> usize {
        match self.platforms.len() {
            0 => 0,
            n => self.platform_count % n,
        }
    }

    pub fn multiplier(&self) -> f32 {
        multiplier(&self.config.speed_steps, self.score)
    }

    /// Effective simulation step for a frame of `dt` seconds.
    pub fn time_scale(&self, dt: f32) -> f32 {
        if self.paused {
            0.0
        } else {
            dt * self.multiplier()
        }
    }

    /// Opacity of a platform, fading in over `fade_distance` after it spawns.
    pub fn platform_opacity(&self, index: usize) -> f32 {
        let fade = self.config.fade_distance;
        if fade <= 0.0 {
            return 1.0;
        }
        self.platforms
            .get(index)
            .map(|p| ((self.config.spawn_z - p.z) / fade).clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }

    /// Advance the course by one frame.
    pub fn step<R: Rng + ?Sized>(&mut self, dt: f32, controls: Controls, rng: &mut R) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.paused {
            return outcome;
        }
        let time_scale = self.time_scale(dt);
        let config = &self.config;

        for platform in &mut self.platforms {
            if platform.z < config.recycle_z {
                if let Some(&lane) = config.lanes.choose(rng) {
                    platform.x = lane;
                }
                platform.z = config.spawn_z;
                log::trace!("Recycled platform to x = {}", platform.x);
            }
        }

        for platform in &mut self.platforms {
            platform.z -= time_scale * config.scroll_speed;
        }

        if controls.left {
            self.player.x -= time_scale * config.strafe_speed;
        }
        if controls.right {
            self.player.x += time_scale * config.strafe_speed;
        }

        // Only a descending player can land; right after a relaunch it may still sit
        // below the landing height for a frame.
        if self.player.y < config.landing_y
            && self.vertical_speed <= 0.0
            && !self.platforms.is_empty()
        {
            let target = self.platforms[self.target_index()];
            if overlaps(
                self.player.x,
                config.player_half_width,
                target.x,
                config.platform_half_width,
            ) {
                self.vertical_speed = config.launch_speed;
                self.score += 1;
                self.platform_count += 1;
                outcome.landed = Some(self.player);
                log::debug!("Landed, score {}", self.score);
            } else {
                outcome.fell = true;
            }
        }

        self.vertical_speed -= config.gravity * time_scale;
        self.player.y += self.vertical_speed * time_scale;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const DT: f32 = 1.0 / 120.0;

    fn course() -> Course {
        Course::new(CourseConfig::default())
    }

    #[test]
    fn multiplier_table() {
        let steps = CourseConfig::default().speed_steps;
        let scores = [0, 5, 6, 10, 11, 20, 21, 40, 41, 80, 81];
        let expected = [1.0, 1.0, 1.2, 1.2, 1.4, 1.4, 1.6, 1.6, 1.8, 1.8, 2.0];
        for (score, want) in scores.iter().zip(expected) {
            assert_eq!(multiplier(&steps, *score), want, "score {score}");
        }
    }

    #[test]
    fn overlap_is_symmetric_and_edge_inclusive() {
        assert!(overlaps(0.0, 0.25, 0.75, 0.5));
        assert!(overlaps(0.75, 0.5, 0.0, 0.25));
        assert!(overlaps(0.0, 0.25, -0.75, 0.5));
        assert!(!overlaps(0.0, 0.25, 0.76, 0.5));
        assert!(!overlaps(0.76, 0.5, 0.0, 0.25));
    }

    #[test]
    fn starts_from_configured_layout() {
        let course = course();
        let zs: Vec<f32> = course.platforms().iter().map(|p| p.z).collect();
        assert_eq!(zs, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(course.player(), Vec3::new(0.0, -1.6, 0.0));
        assert_eq!(course.target_index(), 1);
        assert_eq!(course.score(), 0);
    }

    #[test]
    fn recycled_platform_lands_on_a_lane_at_spawn_distance() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(3);
        course.platforms[0].z = -2.5;
        course.step(0.0, Controls::default(), &mut rng);
        let recycled = course.platforms()[0];
        assert_eq!(recycled.z, 8.0);
        assert!(course.config().lanes.contains(&recycled.x));
        assert_eq!(course.platforms()[1].z, 2.0);
    }

    #[test]
    fn platforms_scroll_by_time_scale() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        course.step(0.5, Controls::default(), &mut rng);
        assert!((course.platforms()[1].z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn paused_course_does_not_move() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        course.step(0.1, Controls::default(), &mut rng);
        course.platforms[2].z = -3.0;
        course.toggle_pause();
        assert_eq!(course.time_scale(0.1), 0.0);

        let platforms = course.platforms().to_vec();
        let player = course.player();
        let controls = Controls {
            left: true,
            right: false,
        };
        for _ in 0..10 {
            let outcome = course.step(0.1, controls, &mut rng);
            assert_eq!(outcome, StepOutcome::default());
        }
        assert_eq!(course.platforms(), &platforms[..]);
        assert_eq!(course.player(), player);
    }

    #[test]
    fn strafing_is_unclamped() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        let left = Controls {
            left: true,
            right: false,
        };
        for _ in 0..10 {
            course.step(0.5, left, &mut rng);
            course.player.y = 0.0;
        }
        assert!((course.player().x + 10.0).abs() < 1e-4);
    }

    #[test]
    fn landing_relaunches_and_scores() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        course.player.y = -1.7;
        course.vertical_speed = -5.0;
        let outcome = course.step(DT, Controls::default(), &mut rng);
        assert_eq!(outcome.landed, Some(Vec3::new(0.0, -1.7, 0.0)));
        assert!(!outcome.fell);
        assert_eq!(course.score(), 1);
        assert_eq!(course.target_index(), 2);
        assert!(course.player().y > -1.7);
    }

    #[test]
    fn missing_the_target_is_a_fall() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        course.player.x = 0.86;
        course.player.y = -1.7;
        let outcome = course.step(DT, Controls::default(), &mut rng);
        assert!(outcome.fell);
        assert!(outcome.landed.is_none());
        assert_eq!(course.score(), 0);
    }

    #[test]
    fn reset_restores_start() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            course.step(DT, Controls::default(), &mut rng);
        }
        course.reset();
        assert_eq!(course.player(), Vec3::new(0.0, -1.6, 0.0));
        assert_eq!(course.platforms()[4].z, 8.0);
        assert_eq!(course.score(), 0);
        assert!(!course.paused());
    }

    #[test]
    fn fade_in_after_spawn() {
        let mut course = course();
        assert_eq!(course.platform_opacity(4), 0.0);
        assert_eq!(course.platform_opacity(0), 1.0);
        course.platforms[4].z = 7.0;
        assert!((course.platform_opacity(4) - 0.5).abs() < 1e-6);
    }

    /// With perfect steering the round-robin target is the platform nearest the
    /// player in z at every landing.
    #[test]
    fn round_robin_target_is_nearest_platform_with_perfect_steering() {
        let dt = 1.0 / 240.0;
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(42);
        let mut landings = 0;
        for _ in 0..(240 * 20) {
            let target = course.target_index();
            course.player.x = course.platforms[target].x;
            let outcome = course.step(dt, Controls::default(), &mut rng);
            assert!(!outcome.fell, "fell after {landings} landings");
            if outcome.landed.is_some() {
                let player_z = course.player().z;
                let nearest = course
                    .platforms()
                    .iter()
                    .enumerate()
                    .min_by(|a, b| (a.1.z - player_z).abs().total_cmp(&(b.1.z - player_z).abs()))
                    .map(|(i, _)| i);
                assert_eq!(nearest, Some(target), "landing {landings}");
                landings += 1;
            }
        }
        assert!(landings >= 15, "only {landings} landings");
    }

    #[test]
    fn relaunch_below_landing_height_is_not_checked_again() {
        let mut course = course();
        let mut rng = StdRng::seed_from_u64(0);
        course.platforms[2].x = 2.0;
        course.player.y = -1.75;
        course.vertical_speed = -5.0;

        let first = course.step(DT, Controls::default(), &mut rng);
        assert!(first.landed.is_some());
        assert!(course.player().y < course.config().landing_y);
        assert_eq!(course.target_index(), 2);

        let second = course.step(DT, Controls::default(), &mut rng);
        assert_eq!(second, StepOutcome::default());
        assert_eq!(course.score(), 1);
    }

    #[test]
    fn unsorted_speed_steps_pick_the_highest_passed_threshold() {
        let steps = [(20, 1.6), (5, 1.2), (80, 2.0), (10, 1.4)];
        assert_eq!(multiplier(&steps, 3), 1.0);
        assert_eq!(multiplier(&steps, 12), 1.4);
        assert_eq!(multiplier(&steps, 81), 2.0);
    }
}
