//! Demo loading bundles from the filesystem tiers
//!
//! Usage: `bundle-loader-demo [config.ron|config.json] [bundle...]`

use std::path::Path;

use bundle_loader::prelude::*;

fn load_config(path: &Path) -> Result<LoaderConfig, bundle_loader::core::ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => LoaderConfig::load_json(path),
        _ => LoaderConfig::load_ron(path),
    }
}

fn main() {
    env_logger::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first().map(Path::new) {
        Some(path) if path.extension().is_some() => {
            let config = match load_config(path) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Failed to read {}: {e}", path.display());
                    std::process::exit(1);
                }
            };
            args.remove(0);
            config
        }
        _ => LoaderConfig::default(),
    };
    if args.is_empty() {
        args.push("ui".to_string());
    }

    let priority = config.default_priority;
    let mut loader = AssetLoader::from_config(config);

    for name in &args {
        let bundle = name.clone();
        let result = pollster::block_on(loader.load_bundle_async(name, priority, move |progress| {
            log::info!("{bundle}: {:.0}%", progress * 100.0);
        }));

        match result {
            Ok(()) => {
                let resources = loader
                    .get_bundle(name)
                    .map(|container| container.resource_names())
                    .unwrap_or_default();
                println!("{name}: {} resources", resources.len());
                for resource in &resources {
                    let key = ResourceKey::compose(name, resource);
                    let texture = loader.get_by_key::<Texture>(&key).ok().flatten();
                    match texture.as_ref().and_then(|handle| handle.get()) {
                        Some(texture) => {
                            println!("  {key} texture {}x{}", texture.width, texture.height);
                        }
                        None => println!("  {key}"),
                    }
                }
            }
            Err(e) => println!("{name}: {e}"),
        }
    }

    loader.unload_all(true);
}
