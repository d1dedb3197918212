//! stgres command line tool.
//!
//! Works with the resource layer without a game attached:
//! - **pack** builds an asset pack from a directory
//! - **list** prints the entries of a pack
//! - **extract** copies one file out through the virtual file system
//! - **simulate** steps a particle descriptor headlessly and prints alive counts
//! - **validate** loads a JSON resource manifest and reports failures
//! - **preview** (raylib feature) draws a particle descriptor in a window
//!
//! Packs listed in the configuration file (`--config`, default
//! `./config.ini`) are mounted before `extract`, `simulate` and `validate`.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- pack assets/ data.zip --password secret
//! cargo run --release -- simulate effects/spark.psi --frames 120
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use bevy_ecs::prelude::*;
use clap::{Parser, Subcommand};
use glam::{DVec2, Vec2};
use log::{error, info};

use stgres::archive::builder::PackBuilder;
use stgres::archive::zip::CompressionMethod;
use stgres::archive::ArchivePack;
use stgres::components::mapposition::MapPosition;
use stgres::components::particleemitter::ParticleEmitter;
use stgres::error::{ResourceError, Result};
use stgres::resources::engineconfig::EngineConfig;
use stgres::resources::manifest::ResourceManifest;
use stgres::resources::particle::{ParticleInfo, ResParticle};
use stgres::resources::particleslab::ParticleSlab;
use stgres::resources::primitives::Rect;
use stgres::resources::renderdevice::{HeadlessDevice, HeadlessTexture, RecordingGraphics};
use stgres::resources::resourcemgr::ResourceManager;
use stgres::resources::resourcepool::ResourceType;
use stgres::resources::sprite::Sprite;
use stgres::resources::texture::ResTexture;
use stgres::resources::worldtime::WorldTime;
use stgres::systems::particleemitter::{particle_cleanup_system, particle_emitter_system};
use stgres::systems::render::render_particles;
use stgres::systems::time::update_world_time;

/// Resource packs and particle tooling for a 2D shooter engine
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// INI configuration with packs and passwords to mount.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an asset pack from every file below a directory.
    Pack {
        dir: PathBuf,
        output: PathBuf,
        /// Encrypt every entry with this password.
        #[arg(long)]
        password: Option<String>,
        /// Store entries without compression.
        #[arg(long)]
        store: bool,
    },
    /// List the entries of a pack.
    List {
        pack: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Extract a file through the mounted packs, falling back to disk.
    Extract {
        path: String,
        target: String,
        /// Extra pack to mount on top of the configured ones.
        #[arg(long = "pack", value_name = "PACK")]
        packs: Vec<String>,
        /// Password for the extra packs.
        #[arg(long)]
        password: Option<String>,
    },
    /// Step a particle descriptor without a window.
    Simulate {
        descriptor: String,
        #[arg(long, default_value_t = 60)]
        frames: u32,
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// Seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Load a JSON resource manifest headlessly.
    Validate { manifest: PathBuf },
    /// Draw a particle descriptor in a window.
    #[cfg(feature = "raylib")]
    Preview {
        descriptor: String,
        /// Particle texture; the whole image is used as the sprite.
        #[arg(long)]
        texture: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = EngineConfig::with_path(&cli.config);
    if cli.config.exists() {
        if let Err(e) = config.load_from_file() {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let result = match cli.command {
        Command::Pack {
            dir,
            output,
            password,
            store,
        } => pack(&dir, &output, password, store),
        Command::List { pack, password } => list(&pack, password.as_deref()),
        Command::Extract {
            path,
            target,
            packs,
            password,
        } => extract(&config, &path, &target, &packs, password.as_deref()),
        Command::Simulate {
            descriptor,
            frames,
            fps,
            seed,
        } => simulate(&config, &descriptor, frames, fps, seed),
        Command::Validate { manifest } => validate(&config, &manifest),
        #[cfg(feature = "raylib")]
        Command::Preview {
            descriptor,
            texture,
        } => preview(&config, &descriptor, &texture),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn pack(dir: &Path, output: &Path, password: Option<String>, store: bool) -> Result<()> {
    let method = if store {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    let mut builder = PackBuilder::new();
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        builder = builder.password(password);
    }
    let builder = builder.add_dir(dir, method)?;
    if builder.is_empty() {
        return Err(ResourceError::InvalidArgument(format!(
            "no files below {:?}",
            dir
        )));
    }
    builder.write_to_file(output)
}

fn list(path: &str, password: Option<&str>) -> Result<()> {
    let pack = ArchivePack::open(path, password)?;
    for name in pack.entry_names() {
        println!("{}", name);
    }
    info!("{} entries", pack.len());
    Ok(())
}

fn mounted_manager(config: &EngineConfig) -> Result<ResourceManager> {
    let mut manager = ResourceManager::new();
    config.apply(&mut manager)?;
    Ok(manager)
}

fn extract(
    config: &EngineConfig,
    path: &str,
    target: &str,
    packs: &[String],
    password: Option<&str>,
) -> Result<()> {
    let mut manager = mounted_manager(config)?;
    for pack in packs {
        manager.load_pack(pack, password.or_else(|| config.password_for(pack)))?;
    }
    manager.extract_resource(path, target)?;
    info!("Extracted '{}' to '{}'", path, target);
    Ok(())
}

fn headless_template(info: ParticleInfo) -> Rc<ResParticle> {
    let texture = Rc::new(ResTexture::new(
        "particle",
        Box::new(HeadlessTexture {
            width: 1,
            height: 1,
        }),
    ));
    let sprite = Sprite::new(texture, Rect::new(0.0, 0.0, 1.0, 1.0), 1.0);
    Rc::new(ResParticle::new("particle", info, sprite, DVec2::ZERO, false))
}

fn simulate(
    config: &EngineConfig,
    descriptor: &str,
    frames: u32,
    fps: f32,
    seed: Option<u64>,
) -> Result<()> {
    if fps <= 0.0 {
        return Err(ResourceError::InvalidArgument(format!("fps must be positive, got {}", fps)));
    }
    let mut manager = mounted_manager(config)?;
    let info = ParticleInfo::from_bytes(&manager.load_file(descriptor)?)?;
    println!(
        "emission={}/s lifetime={} life=[{}, {}] blend={:?}",
        info.emission,
        info.lifetime,
        info.particle_life_min,
        info.particle_life_max,
        info.blend_mode()
    );

    let template = headless_template(info);
    let mut slab = ParticleSlab::with_capacity(config.max_particle_systems.max(1));
    let handle = template.alloc_instance(&mut slab)?;
    if let (Some(seed), Some(pool)) = (seed, slab.get_mut(handle)) {
        pool.seed(seed);
    }

    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_non_send_resource(slab);
    world.spawn((MapPosition::default(), ParticleEmitter::new(handle).one_shot()));

    let mut update = Schedule::default();
    update.add_systems((particle_emitter_system, particle_cleanup_system).chain());

    let dt = 1.0 / fps;
    let mut graphics = RecordingGraphics::new();
    let mut peak = 0;
    for frame in 1..=frames {
        update_world_time(&mut world, dt);
        update.run(&mut world);

        graphics.clear();
        render_particles(&mut world, &mut graphics, 1.0);
        peak = peak.max(graphics.draws.len());
        println!("frame {:>5}: {:>3} alive", frame, graphics.draws.len());

        if world.non_send_resource::<ParticleSlab>().is_empty() {
            println!("system finished after {} frames", frame);
            break;
        }
    }
    println!("peak alive: {}", peak);
    Ok(())
}

fn validate(config: &EngineConfig, path: &Path) -> Result<()> {
    let manifest = ResourceManifest::load_from_file(path)?;
    let mut manager = mounted_manager(config)?;
    let mut device = HeadlessDevice::new();
    let report = manifest.apply(&mut manager, &mut device);

    for kind in ResourceType::ALL {
        let names = manager.list_resource_names(kind);
        if !names.is_empty() {
            println!("{}: {}", kind, names.join(", "));
        }
    }
    for failure in &report.failed {
        println!("FAILED {}", failure);
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(ResourceError::InvalidArgument(format!(
            "{} manifest entries failed",
            report.failed.len()
        )))
    }
}

#[cfg(feature = "raylib")]
fn preview(config: &EngineConfig, descriptor: &str, texture_path: &str) -> Result<()> {
    use raylib::prelude::*;
    use stgres::resources::raylibdevice::{RaylibDevice, RaylibGraphics};

    let mut manager = mounted_manager(config)?;
    let info = ParticleInfo::from_bytes(&manager.load_file(descriptor)?)?;

    let (mut rl, thread) = raylib::init().size(800, 600).title("stgres preview").build();
    rl.set_target_fps(60);

    {
        let mut device = RaylibDevice::new(&mut rl, &thread);
        manager.load_texture("preview", texture_path, false, &mut device)?;
    }
    let texture = manager
        .find_texture("preview")
        .ok_or_else(|| ResourceError::not_found("texture 'preview'"))?;
    let rect = Rect::new(0.0, 0.0, texture.width() as f32, texture.height() as f32);
    let sprite = Sprite::new(texture, rect, manager.image_scale());
    let template = Rc::new(ResParticle::new("preview", info, sprite, DVec2::ZERO, false));

    let mut slab = ParticleSlab::new();
    let handle = template.alloc_instance(&mut slab)?;

    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_non_send_resource(slab);
    let emitter = world
        .spawn((MapPosition::new(400.0, 300.0), ParticleEmitter::new(handle)))
        .id();

    let mut update = Schedule::default();
    update.add_systems(particle_emitter_system);

    while !rl.window_should_close() {
        let mouse = rl.get_mouse_position();
        if let Some(mut pos) = world.get_mut::<MapPosition>(emitter) {
            pos.pos = Vec2::new(mouse.x, mouse.y);
        }
        update_world_time(&mut world, rl.get_frame_time());
        update.run(&mut world);

        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::BLACK);
        let mut graphics = RaylibGraphics::new(&mut d);
        render_particles(&mut world, &mut graphics, 1.0);
    }
    Ok(())
}
