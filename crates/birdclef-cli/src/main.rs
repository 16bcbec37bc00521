//!
//! CLI для пайплайна признаков BirdCLEF: извлечение mel-признаков,
//! реконструкция аудио и работа с датасетами.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Instant;

use audio::{probe_audio, save_wav};
use birdclef_core::{DataConfig, Dataset, FeatureConfig, PipelineSwitches};
use birdclef_data::{dataset_specs, DataLoaderOptions, DatasetRegistry, FeaturePipeline};
use tracing::info;

#[derive(Parser)]
#[command(name = "birdclef")]
#[command(author, version, about = "BirdCLEF mel feature pipeline and datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Переключатели пайплайна.
#[derive(Args, Debug, Clone, Copy)]
struct SwitchArgs {
    /// PCEN вместо децибел
    #[arg(long, default_value_t = false)]
    pcen: bool,

    /// Включить аугментации (шум и частотная маска)
    #[arg(long, default_value_t = false)]
    augment: bool,

    /// Случайное смещение клипа внутри файла
    #[arg(long, default_value_t = false)]
    random_offset: bool,
}

impl From<SwitchArgs> for PipelineSwitches {
    fn from(args: SwitchArgs) -> Self {
        PipelineSwitches::new(args.pcen, args.augment, args.random_offset)
    }
}

/// Расположение метаданных и аудио.
///
/// Без флагов используются `BIRDCLEF_DATA_DIR` / `BIRDCLEF_AUDIO_DIR` или значения по умолчанию.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Директория с `base/` и `repeated/`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Запасная директория метаданных
    #[arg(long)]
    fallback_dir: Option<PathBuf>,

    /// Корень аудиофайлов
    #[arg(long)]
    audio_root: Option<PathBuf>,

    /// JSON с параметрами признаков (недостающие поля — по умолчанию)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl DataArgs {
    fn data_config(&self) -> DataConfig {
        let mut config = DataConfig::from_env();
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
            if self.audio_root.is_none() {
                config = config.with_audio_root(dir.join("train_audio"));
            }
        }
        if let Some(dir) = &self.fallback_dir {
            config = config.with_fallback_data_dir(dir);
        }
        if let Some(dir) = &self.audio_root {
            config = config.with_audio_root(dir);
        }
        config
    }

    fn registry(&self) -> Result<DatasetRegistry> {
        let data = self.data_config();
        let features = load_feature_config(self.config.as_ref())?;
        DatasetRegistry::new(data.clone(), features).with_context(|| {
            format!(
                "Не удалось загрузить метаданные из {} (запасная: {})",
                data.data_dir.display(),
                data.fallback_data_dir.display()
            )
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the feature pipeline on one audio file
    Extract {
        /// Path to the audio file (WAV, OGG, FLAC, MP3)
        #[arg(long)]
        audio: PathBuf,

        #[command(flatten)]
        switches: SwitchArgs,

        /// JSON с параметрами признаков
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed для аугментаций и смещения
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Reconstruct a waveform from the decibel features of an audio file
    Reconstruct {
        /// Path to the audio file
        #[arg(long)]
        audio: PathBuf,

        /// Output WAV path
        #[arg(long)]
        out: PathBuf,

        /// JSON с параметрами признаков
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List registered dataset keys
    Datasets,

    /// Build a dataset by key and print its size, classes and label histogram
    Inspect {
        /// Dataset key (e.g. `train_simple`)
        key: String,

        #[command(flatten)]
        data: DataArgs,

        /// Также вычислить признаки первых N элементов
        #[arg(long, default_value_t = 0)]
        items: usize,
    },

    /// Iterate over a dataloader and print batch shapes
    Batches {
        /// Dataset key
        key: String,

        #[command(flatten)]
        data: DataArgs,

        /// JSON с параметрами загрузчика (неизвестные ключи игнорируются)
        #[arg(long)]
        options: Option<PathBuf>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long, default_value_t = false)]
        shuffle: bool,

        #[arg(long)]
        seed: Option<u64>,

        /// Остановиться после N батчей
        #[arg(long)]
        max_batches: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            audio,
            switches,
            config,
            seed,
        } => run_extract(audio, switches.into(), config, seed),

        Commands::Reconstruct { audio, out, config } => run_reconstruct(audio, out, config),

        Commands::Datasets => {
            run_datasets();
            Ok(())
        }

        Commands::Inspect { key, data, items } => run_inspect(&key, &data, items),

        Commands::Batches {
            key,
            data,
            options,
            batch_size,
            shuffle,
            seed,
            max_batches,
        } => {
            let mut opts = match options {
                Some(path) => DataLoaderOptions::from_json_file(&path)
                    .with_context(|| format!("Не удалось прочитать {}", path.display()))?,
                None => DataLoaderOptions::default(),
            };
            if let Some(b) = batch_size {
                opts.batch_size = b;
            }
            if shuffle {
                opts.shuffle = true;
            }
            if let Some(s) = seed {
                opts.seed = Some(s);
            }
            run_batches(&key, &data, opts, max_batches)
        }
    }
}

fn load_feature_config(path: Option<&PathBuf>) -> Result<FeatureConfig> {
    match path {
        Some(p) => FeatureConfig::from_json_file(p)
            .with_context(|| format!("Некорректный конфиг признаков: {}", p.display())),
        None => Ok(FeatureConfig::default()),
    }
}

fn run_extract(
    audio: PathBuf,
    switches: PipelineSwitches,
    config: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<()> {
    println!("🐦 BirdCLEF - Feature Extraction");
    println!("================================");
    println!("Audio file: {}", audio.display());
    println!("Switches: {:?}", switches);
    println!();

    let start = Instant::now();
    let info = probe_audio(&audio)?;
    println!(
        "📂 Native: {} Hz, {} channel(s), {} frames",
        info.sample_rate,
        info.channels,
        info.num_frames
            .map_or_else(|| "?".to_string(), |n| n.to_string())
    );

    let pipeline = FeaturePipeline::new(load_feature_config(config.as_ref())?, switches)?;
    let features = match seed {
        Some(s) => pipeline.transform_with_rng(&audio, &mut StdRng::seed_from_u64(s))?,
        None => pipeline.transform(&audio)?,
    };

    let values = features.flatten_all()?.to_vec1::<f32>()?;
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;

    println!("📊 Shape: {:?}", features.dims());
    println!("   min={:.3} max={:.3} mean={:.3}", min, max, mean);
    println!("⏱️  Done in {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}

fn run_reconstruct(audio: PathBuf, out: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = load_feature_config(config.as_ref())?;
    let sample_rate = config.sample_rate;
    let pipeline = FeaturePipeline::new(config, PipelineSwitches::default())?;

    let start = Instant::now();
    println!("🔄 Extracting features from {}...", audio.display());
    let features = pipeline.transform(&audio)?;

    println!("🔊 Griffin-Lim reconstruction...");
    let wave = pipeline.inverse_transform(&features)?;
    save_wav(&out, &wave, sample_rate)
        .with_context(|| format!("Не удалось записать {}", out.display()))?;

    println!(
        "✅ Saved {} samples ({:.2}s) to {} in {:.2}s",
        wave.len(),
        wave.len() as f32 / sample_rate as f32,
        out.display(),
        start.elapsed().as_secs_f32()
    );
    Ok(())
}

fn run_datasets() {
    let specs = dataset_specs();
    println!("Зарегистрировано датасетов: {}", specs.len());
    for spec in specs {
        println!(
            "{:<34} source={:<8} split={:<5} pcen={:<5} augment={:<5} offset={}",
            spec.key,
            spec.source.as_str(),
            spec.split.as_str(),
            spec.switches.pcen,
            spec.switches.augment,
            spec.switches.random_offset
        );
    }
}

fn run_inspect(key: &str, data: &DataArgs, items: usize) -> Result<()> {
    let registry = data.registry()?;
    let metadata = registry.metadata(key)?;
    let dataset = registry.get_dataset(key)?;

    let present: BTreeSet<&str> = metadata.labels().into_iter().collect();
    let unknown = present
        .iter()
        .filter(|l| !dataset.classes().iter().any(|c| c == *l))
        .count();

    println!("📦 Dataset: {}", key);
    println!("   Metadata: {}", registry.data_dir().display());
    println!("   Rows: {}", dataset.len());
    println!(
        "   Classes: {} ({} labels in split, {} outside vocabulary)",
        dataset.num_classes(),
        present.len(),
        unknown
    );
    println!(
        "   Item shape: [1, {}, {}]",
        dataset.pipeline().config().n_mels,
        dataset.pipeline().target_frames()
    );

    let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
    for idx in 0..dataset.len() {
        *histogram.entry(dataset.label(idx)?).or_default() += 1;
    }
    println!("📊 Labels:");
    for (label, count) in &histogram {
        let name = dataset
            .classes()
            .get(*label as usize)
            .map_or("<none>", String::as_str);
        println!("   {:>4} {:<12} {}", label, name, count);
    }

    for idx in 0..items.min(dataset.len()) {
        let item = dataset.get(idx)?;
        println!(
            "   [{}] {:?} label={} {}",
            idx,
            item.input.dims(),
            item.label,
            item.filename.display()
        );
    }
    Ok(())
}

fn run_batches(
    key: &str,
    data: &DataArgs,
    options: DataLoaderOptions,
    max_batches: Option<usize>,
) -> Result<()> {
    let registry = data.registry()?;
    let loader = registry.get_dataloader(key, options)?;
    let limit = max_batches.unwrap_or(usize::MAX);

    info!(
        "Dataloader '{}': {} items, {} batches",
        key,
        loader.dataset().len(),
        loader.num_batches()
    );

    let start = Instant::now();
    for (i, batch) in loader.iter().take(limit).enumerate() {
        let batch = batch?;
        let labels = batch.labels.to_vec1::<u32>()?;
        println!(
            "batch {:>4}: inputs {:?} labels {:?}",
            i,
            batch.inputs.dims(),
            labels
        );
    }
    println!("⏱️  Done in {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}
