//! Stage transition event and observer.
//!
//! Emitting a [`StageEvent`] switches the
//! [`ResourceManager`](crate::resources::resourcemgr::ResourceManager)
//! between level scopes:
//!
//! - [`StageEvent::Enter`] makes the stage pool receive loads
//! - [`StageEvent::Leave`] clears the stage pool and reselects the global pool
//!
//! The manager is a non-send resource, so the observer queues a command that
//! runs with exclusive world access.
use bevy_ecs::observer::On;
use bevy_ecs::prelude::*;
use log::{info, warn};

use crate::resources::resourcemgr::ResourceManager;
use crate::resources::resourcepool::PoolType;

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Enter,
    Leave,
}

/// Observer that applies a stage transition to the resource manager.
pub fn stage_observer(trigger: On<StageEvent>, mut commands: Commands) {
    let event = *trigger.event();
    commands.queue(move |world: &mut World| {
        let Some(mut manager) = world.get_non_send_resource_mut::<ResourceManager>() else {
            warn!("stage_observer: no ResourceManager in the world");
            return;
        };
        match event {
            StageEvent::Enter => {
                manager.set_active_pool(PoolType::Stage);
                info!("Entered stage, loads go to the stage pool");
            }
            StageEvent::Leave => {
                manager.pool_mut(PoolType::Stage).clear();
                manager.set_active_pool(PoolType::Global);
                info!("Left stage, stage pool cleared");
            }
        }
    });
}
