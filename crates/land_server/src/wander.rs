//! Wandering creatures.
//!
//! The wander system ticks at a fixed period. On every tick each
//! [`PropertyType::Wanderer`] entity whose period divides the tick count
//! tries the four directions clockwise, starting from one derived from its ID
//! and the tick, and takes the first open step.

use std::sync::Arc;
use std::time::Duration;

use land_component::{Property, PropertyType};
use land_math::Direction;
use land_scene::{SceneError, StopSignal, System, spawn_system};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::world::World;

/// Name the wander system registers under.
pub const WANDER_SYSTEM: &str = "wander";

/// Moves every wanderer in the world on a fixed period.
#[derive(Debug)]
pub struct WanderSystem {
    signal: StopSignal,
}

impl System for WanderSystem {
    fn name(&self) -> &str {
        WANDER_SYSTEM
    }

    fn stop(&self) {
        self.signal.stop();
    }
}

impl WanderSystem {
    /// Register the system with the world's scene and start its task.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateSystem`] if a wander system is already
    /// running in this scene.
    pub fn start(world: &Arc<World>, period: Duration) -> Result<JoinHandle<()>, SceneError> {
        let signal = StopSignal::new();
        let system = Arc::new(Self {
            signal: signal.clone(),
        });
        let task_world = Arc::clone(world);
        spawn_system(world.scene(), system, async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                tokio::select! {
                    () = signal.stopped() => break,
                    _ = ticker.tick() => {
                        tick += 1;
                        let moved = step_wanderers(&task_world, tick);
                        if moved > 0 {
                            debug!(tick, moved, "wanderers moved");
                        }
                    }
                }
            }
        })
    }
}

/// Advance every wanderer due on `tick`. Returns how many moved.
pub fn step_wanderers(world: &World, tick: u64) -> usize {
    let mut moved = 0;
    for entity in world.scene().find(&[PropertyType::Wanderer]) {
        let period = match entity.property(PropertyType::Wanderer) {
            Some(Property::Wanderer { period_ticks }) => u64::from((*period_ticks).max(1)),
            _ => continue,
        };
        if tick % period != 0 {
            continue;
        }
        let start = Direction::ALL[(entity.id.id().wrapping_add(tick / period) % 4) as usize];
        let stepped = std::iter::successors(Some(start), |dir| Some(dir.clockwise()))
            .take(Direction::ALL.len())
            .any(|direction| world.step(entity.id, direction));
        if stepped {
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use land_component::{Entity, EntityId, MapChunk};
    use land_math::Position;
    use land_net::transport::outbound;
    use land_net::{ClientPacket, ServerPacket};
    use uuid::Uuid;

    use super::*;

    fn world_with_rat(map: MapChunk, period_ticks: u32) -> World {
        let world = World::new(map);
        world
            .scene()
            .spawn(
                Entity::new(EntityId(100))
                    .named("rat")
                    .at(Position::new(2, 2))
                    .with_property(Property::Wanderer { period_ticks }),
            )
            .unwrap();
        world
    }

    #[test]
    fn test_wanderer_moves_on_its_period() {
        let world = world_with_rat(MapChunk::bordered(5, 5), 3);
        assert_eq!(step_wanderers(&world, 1), 0);
        assert_eq!(step_wanderers(&world, 2), 0);
        assert_eq!(step_wanderers(&world, 3), 1);
        let rat = world.scene().get(EntityId(100)).unwrap();
        assert_eq!((rat.position - Position::new(2, 2)).abs().element_sum(), 1);
    }

    #[test]
    fn test_boxed_in_wanderer_stays() {
        let map = MapChunk::from_rows(&["#####", "#####", "##.##", "#####", "#####"]);
        let world = world_with_rat(map, 1);
        assert_eq!(step_wanderers(&world, 1), 0);
        assert_eq!(
            world.scene().get(EntityId(100)).unwrap().position,
            Position::new(2, 2)
        );
    }

    #[test]
    fn test_moves_are_broadcast() {
        let world = world_with_rat(MapChunk::bordered(5, 5), 1);
        let (tx, mut rx) = outbound();
        let conn = Uuid::new_v4();
        world.register(conn, tx);
        world.handle(conn, ClientPacket::Connect("alice".to_string()));
        while rx.try_recv().is_ok() {}

        step_wanderers(&world, 1);
        assert!(matches!(rx.try_recv(), Ok(ServerPacket::Action(e)) if e.id == EntityId(100)));
    }

    #[tokio::test]
    async fn test_system_stops_on_request() {
        let world = Arc::new(world_with_rat(MapChunk::bordered(5, 5), 1));
        let handle = WanderSystem::start(&world, Duration::from_millis(5)).unwrap();
        assert_eq!(world.scene().system_names(), vec![WANDER_SYSTEM.to_string()]);
        assert!(matches!(
            WanderSystem::start(&world, Duration::from_millis(5)),
            Err(SceneError::DuplicateSystem(_))
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tokio::time::timeout(Duration::from_secs(2), world.scene().stop_systems())
            .await
            .unwrap();
        handle.await.unwrap();
        assert_eq!(world.scene().outstanding_systems(), 0);
        assert!(world.scene().system_names().is_empty());
    }
}
