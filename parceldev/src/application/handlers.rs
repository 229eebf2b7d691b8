use std::path::PathBuf;

use parcel_core::domain::ArchiveStatus;
use parcel_core::error::{ParcelError, Result};
use parcel_core::run::{RunConfig, Stage, launch, presets};
use parcel_core::template::{self, Conversation, SpecialTokens};
use parcel_core::{
    ArchiveFormat, ByteSize, ChunkPolicy, Compression, compress_and_maybe_split,
    maybe_merge_and_decompress, status,
};

/// Command-line overrides applied on top of the policy file (or defaults).
#[derive(Clone, Debug, Default)]
pub struct SplitOptions {
    pub threshold: Option<ByteSize>,
    pub format: Option<ArchiveFormat>,
    pub compression: Option<Compression>,
    pub level: Option<i64>,
    pub config: Option<PathBuf>,
}

impl SplitOptions {
    fn policy(&self) -> Result<ChunkPolicy> {
        let mut policy = match &self.config {
            Some(path) => ChunkPolicy::load(path)?,
            None => ChunkPolicy::default(),
        };
        if let Some(t) = self.threshold {
            policy.threshold = t;
        }
        if let Some(f) = self.format {
            policy.format = f;
        }
        if let Some(c) = self.compression {
            policy.compression = c;
        }
        if self.level.is_some() {
            policy.level = self.level;
        }
        Ok(policy)
    }
}

pub fn handle_split(path: PathBuf, opts: SplitOptions) -> Result<()> {
    let policy = opts.policy()?;
    let report = compress_and_maybe_split(&path, &policy)?;
    let archive = &report.archive;
    eprintln!(
        "split: {} is {} ({} files, {} dirs, {} input)",
        archive.path.display(),
        ByteSize(archive.size),
        report.stats.files,
        report.stats.dirs,
        ByteSize(report.stats.input_bytes),
    );
    if report.stats.skipped > 0 {
        eprintln!("split: {} entries skipped", report.stats.skipped);
    }
    if report.was_split() {
        eprintln!(
            "split: over {} threshold, wrote {} parts",
            policy.threshold,
            report.chunks.len()
        );
        for c in &report.chunks {
            println!("{}\t{}", c.path.display(), c.len);
        }
    } else {
        eprintln!("split: within {} threshold, kept whole", policy.threshold);
        println!("{}\t{}", archive.path.display(), archive.size);
    }
    eprintln!("split: blake3 {}", archive.digest);
    Ok(())
}

pub fn handle_merge(path: PathBuf, format: Option<ArchiveFormat>) -> Result<()> {
    let report = maybe_merge_and_decompress(&path, format)?;
    if report.parts > 0 {
        eprintln!(
            "merge: joined {} parts into {} ({})",
            report.parts,
            report.archive.path.display(),
            ByteSize(report.archive.size)
        );
    }
    eprintln!(
        "merge: unpacked {} entries into {}",
        report.entries,
        report.target.display()
    );
    eprintln!("merge: blake3 {}", report.archive.digest);
    Ok(())
}

pub fn handle_status(path: PathBuf, format: Option<ArchiveFormat>, json: bool) -> Result<()> {
    let st = status(&path, format)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&st)?);
        return Ok(());
    }
    match st {
        ArchiveStatus::Missing { path } => {
            println!("missing\t{}", path.display());
        }
        ArchiveStatus::Whole { path, format, size } => {
            println!("whole\t{}\t{format}\t{}", path.display(), ByteSize(size));
        }
        ArchiveStatus::Split {
            archive,
            format,
            chunks,
            total,
            problem,
            whole_present,
        } => {
            println!(
                "split\t{}\t{format}\t{} parts\t{}",
                archive.display(),
                chunks.len(),
                ByteSize(total)
            );
            for c in &chunks {
                println!("  #{:<4} {:<8} {}", c.index, c.suffix, c.len);
            }
            if whole_present {
                eprintln!("status: {} also exists; merge will use the parts", archive.display());
            }
            if let Some(p) = problem {
                eprintln!("status: cannot merge: {p}");
            }
        }
    }
    Ok(())
}

pub fn handle_run_render(config: PathBuf, json: bool) -> Result<()> {
    let run = RunConfig::load(&config)?;
    let opts = run.to_options();
    if json {
        println!("{}", serde_json::to_string_pretty(&opts)?);
    } else {
        for (k, v) in &opts {
            println!("--{k} {v}");
        }
    }
    Ok(())
}

pub fn handle_run_launch(config: PathBuf, dry_run: bool) -> Result<()> {
    let run = RunConfig::load(&config)?;
    if dry_run {
        println!("{}", launch::dry_run(&run)?.join(" "));
        return Ok(());
    }
    eprintln!(
        "run: {} stage on {} -> {}",
        run.stage.as_str(),
        run.model_name_or_path,
        run.output_dir
    );
    launch::launch(&run)?;
    eprintln!("run: finished");
    Ok(())
}

pub fn handle_run_preset(
    stage: Stage,
    model: String,
    output: String,
    template: String,
    datasets: Vec<String>,
) -> Result<()> {
    let run = match stage {
        Stage::Sft => presets::sft(&model, &output, &template, &datasets),
        Stage::Dpo => presets::dpo(&model, &output, &template, &datasets),
    };
    run.validate()?;
    print!("{}", run.to_yaml()?);
    Ok(())
}

pub fn handle_template_list() -> Result<()> {
    for name in template::names() {
        println!("{name}");
    }
    Ok(())
}

fn lookup(name: &str) -> Result<&'static template::Template> {
    template::get(name)
        .ok_or_else(|| ParcelError::Config(format!("unknown template {name:?}")))
}

pub fn handle_template_show(name: String) -> Result<()> {
    let tpl = lookup(&name)?;
    println!("{}", serde_json::to_string_pretty(tpl)?);
    let stop = tpl.effective_stop_words()?;
    if let Some(eos) = tpl.eos_override()? {
        eprintln!("template: eos token replaced by {eos:?}, stop words {stop:?}");
    }
    Ok(())
}

pub fn handle_template_render(
    name: String,
    conversation: PathBuf,
    bos: String,
    eos: String,
) -> Result<()> {
    let tpl = lookup(&name)?;
    let text = std::fs::read_to_string(&conversation).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParcelError::NotFound(conversation.clone()),
        _ => e.into(),
    })?;
    let convo: Conversation = serde_json::from_str(&text)?;
    let tokens = SpecialTokens { bos, eos };
    let tools = convo.tools_json();
    let pairs = tpl.render(
        &convo.messages,
        convo.system.as_deref(),
        tools.as_deref(),
        &tokens,
    )?;
    for (i, (prompt, response)) in pairs.iter().enumerate() {
        println!("### turn {i} prompt");
        println!("{prompt}");
        println!("### turn {i} response");
        println!("{response}");
    }
    Ok(())
}
