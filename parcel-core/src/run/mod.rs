//! Fine-tuning run descriptions and their rendering into the flat
//! `--key value` options the training launcher takes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParcelError, Result};
use crate::template;

pub mod launch;
pub mod presets;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Supervised fine-tuning.
    Sft,
    /// Direct preference optimization.
    Dpo,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Sft => "sft",
            Stage::Dpo => "dpo",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sft" => Ok(Stage::Sft),
            "dpo" => Ok(Stage::Dpo),
            other => Err(ParcelError::Config(format!("unknown stage {other:?}"))),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinetuningType {
    #[default]
    Lora,
    Freeze,
    Full,
}

impl FinetuningType {
    fn as_str(self) -> &'static str {
        match self {
            FinetuningType::Lora => "lora",
            FinetuningType::Freeze => "freeze",
            FinetuningType::Full => "full",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Bf16,
    Fp16,
    PureBf16,
    Fp32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RopeScaling {
    Linear,
    Dynamic,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduler {
    Linear,
    #[default]
    Cosine,
    Constant,
    ConstantWithWarmup,
    Polynomial,
}

impl LrScheduler {
    fn as_str(self) -> &'static str {
        match self {
            LrScheduler::Linear => "linear",
            LrScheduler::Cosine => "cosine",
            LrScheduler::Constant => "constant",
            LrScheduler::ConstantWithWarmup => "constant_with_warmup",
            LrScheduler::Polynomial => "polynomial",
        }
    }
}

/// External program that receives the rendered options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub program: String,
    /// Arguments placed before the options, e.g. the `train` subcommand.
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: "llamafactory-cli".into(),
            args: vec!["train".into()],
            env: BTreeMap::new(),
        }
    }
}

fn yes() -> bool {
    true
}

/// One training run. Field names match the launcher's option names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub stage: Stage,
    #[serde(default = "yes")]
    pub do_train: bool,
    pub model_name_or_path: String,
    pub output_dir: String,
    #[serde(default)]
    pub overwrite_output_dir: bool,

    pub dataset: Vec<String>,
    #[serde(default)]
    pub dataset_dir: Option<String>,
    pub template: String,
    #[serde(default = "RunConfig::default_cutoff_len")]
    pub cutoff_len: u32,
    #[serde(default)]
    pub preprocessing_num_workers: Option<u32>,

    #[serde(default = "RunConfig::default_batch_size")]
    pub per_device_train_batch_size: u32,
    #[serde(default = "RunConfig::default_grad_accum")]
    pub gradient_accumulation_steps: u32,
    #[serde(default)]
    pub lr_scheduler_type: LrScheduler,
    #[serde(default = "RunConfig::default_logging_steps")]
    pub logging_steps: u32,
    #[serde(default = "RunConfig::default_save_steps")]
    pub save_steps: u32,
    #[serde(default)]
    pub save_total_limit: Option<u32>,
    #[serde(default = "RunConfig::default_optim")]
    pub optim: String,
    pub learning_rate: f64,
    pub num_train_epochs: f64,
    #[serde(default)]
    pub warmup_ratio: f64,
    #[serde(default)]
    pub neftune_noise_alpha: Option<f64>,
    #[serde(default)]
    pub precision: Precision,
    /// DPO only.
    #[serde(default)]
    pub dpo_beta: Option<f64>,

    #[serde(default)]
    pub finetuning_type: FinetuningType,
    #[serde(default = "RunConfig::default_lora_rank")]
    pub lora_rank: u32,
    #[serde(default)]
    pub lora_alpha: Option<u32>,
    #[serde(default)]
    pub lora_dropout: f64,
    #[serde(default = "RunConfig::default_lora_target")]
    pub lora_target: Vec<String>,
    #[serde(default)]
    pub quantization_bit: Option<u8>,

    #[serde(default)]
    pub rope_scaling: Option<RopeScaling>,
    #[serde(default = "yes")]
    pub use_fast_tokenizer: bool,
    #[serde(default = "RunConfig::default_report_to")]
    pub report_to: String,

    /// Options passed through untouched; they win over generated ones.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,

    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl RunConfig {
    fn default_cutoff_len() -> u32 {
        1024
    }
    fn default_batch_size() -> u32 {
        1
    }
    fn default_grad_accum() -> u32 {
        8
    }
    fn default_logging_steps() -> u32 {
        10
    }
    fn default_save_steps() -> u32 {
        500
    }
    fn default_optim() -> String {
        "adamw_torch".into()
    }
    fn default_lora_rank() -> u32 {
        8
    }
    fn default_lora_target() -> Vec<String> {
        vec!["all".into()]
    }
    fn default_report_to() -> String {
        "none".into()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ParcelError::NotFound(path.to_path_buf()),
            _ => e.into(),
        })?;
        let cfg: RunConfig = serde_yaml_ng::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(ParcelError::Config(msg));

        if self.model_name_or_path.trim().is_empty() {
            return bad("model_name_or_path is empty".into());
        }
        if self.output_dir.trim().is_empty() {
            return bad("output_dir is empty".into());
        }
        if self.dataset.iter().all(|d| d.trim().is_empty()) {
            return bad("at least one dataset is required".into());
        }
        let tpl = template::get(&self.template).ok_or_else(|| {
            ParcelError::Config(format!(
                "unknown template {:?} (known: {})",
                self.template,
                template::names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        tpl.eos_override()?;

        if !(self.learning_rate > 0.0) {
            return bad(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.num_train_epochs > 0.0) {
            return bad(format!("num_train_epochs must be positive, got {}", self.num_train_epochs));
        }
        if self.per_device_train_batch_size == 0 || self.gradient_accumulation_steps == 0 {
            return bad("batch size and gradient accumulation must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.warmup_ratio) {
            return bad(format!("warmup_ratio must lie in [0, 1], got {}", self.warmup_ratio));
        }
        if let Some(a) = self.neftune_noise_alpha {
            if !(a > 0.0) {
                return bad(format!("neftune_noise_alpha must be positive, got {a}"));
            }
        }

        if let Some(bits) = self.quantization_bit {
            if bits != 4 && bits != 8 {
                return bad(format!("quantization_bit must be 4 or 8, got {bits}"));
            }
            if self.finetuning_type != FinetuningType::Lora {
                return bad("quantized training requires finetuning_type: lora".into());
            }
        }
        if self.finetuning_type == FinetuningType::Lora {
            if self.lora_rank == 0 {
                return bad("lora_rank must be positive".into());
            }
            if !(0.0..1.0).contains(&self.lora_dropout) {
                return bad(format!("lora_dropout must lie in [0, 1), got {}", self.lora_dropout));
            }
            if self.lora_target.is_empty() {
                return bad("lora_target must name at least one module".into());
            }
        }

        match self.stage {
            Stage::Dpo => match self.dpo_beta {
                Some(b) if b > 0.0 => {}
                Some(b) => return bad(format!("dpo_beta must be positive, got {b}")),
                None => return bad("stage dpo requires dpo_beta".into()),
            },
            Stage::Sft => {
                if self.dpo_beta.is_some() {
                    tracing::warn!("dpo_beta is ignored for stage sft");
                }
            }
        }
        Ok(())
    }

    /// Flat option map handed to the launcher. Unset optional fields are left
    /// out; `extra` entries override generated keys.
    pub fn to_options(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            m.insert(k.to_string(), v);
        };

        put("stage", self.stage.as_str().into());
        put("do_train", self.do_train.to_string());
        put("model_name_or_path", self.model_name_or_path.clone());
        put("output_dir", self.output_dir.clone());
        put("overwrite_output_dir", self.overwrite_output_dir.to_string());
        put("dataset", self.dataset.join(","));
        if let Some(d) = &self.dataset_dir {
            put("dataset_dir", d.clone());
        }
        put("template", self.template.clone());
        put("cutoff_len", self.cutoff_len.to_string());
        if let Some(n) = self.preprocessing_num_workers {
            put("preprocessing_num_workers", n.to_string());
        }

        put("per_device_train_batch_size", self.per_device_train_batch_size.to_string());
        put("gradient_accumulation_steps", self.gradient_accumulation_steps.to_string());
        put("lr_scheduler_type", self.lr_scheduler_type.as_str().into());
        put("logging_steps", self.logging_steps.to_string());
        put("save_steps", self.save_steps.to_string());
        if let Some(n) = self.save_total_limit {
            put("save_total_limit", n.to_string());
        }
        put("optim", self.optim.clone());
        put("learning_rate", self.learning_rate.to_string());
        put("num_train_epochs", self.num_train_epochs.to_string());
        put("warmup_ratio", self.warmup_ratio.to_string());
        if let Some(a) = self.neftune_noise_alpha {
            put("neftune_noise_alpha", a.to_string());
        }
        match self.precision {
            Precision::Bf16 => put("bf16", "true".into()),
            Precision::Fp16 => put("fp16", "true".into()),
            Precision::PureBf16 => put("pure_bf16", "true".into()),
            Precision::Fp32 => {}
        }
        if let (Stage::Dpo, Some(b)) = (self.stage, self.dpo_beta) {
            put("dpo_beta", b.to_string());
        }

        put("finetuning_type", self.finetuning_type.as_str().into());
        if self.finetuning_type == FinetuningType::Lora {
            put("lora_rank", self.lora_rank.to_string());
            if let Some(a) = self.lora_alpha {
                put("lora_alpha", a.to_string());
            }
            put("lora_dropout", self.lora_dropout.to_string());
            put("lora_target", self.lora_target.join(","));
        }
        if let Some(bits) = self.quantization_bit {
            put("quantization_bit", bits.to_string());
        }

        if let Some(r) = self.rope_scaling {
            let v = match r {
                RopeScaling::Linear => "linear",
                RopeScaling::Dynamic => "dynamic",
            };
            put("rope_scaling", v.into());
        }
        put("use_fast_tokenizer", self.use_fast_tokenizer.to_string());
        put("report_to", self.report_to.clone());

        for (k, v) in &self.extra {
            put(k, v.clone());
        }
        m
    }

    /// `--key value` pairs in key order.
    pub fn to_args(&self) -> Vec<String> {
        self.to_options()
            .into_iter()
            .flat_map(|(k, v)| [format!("--{k}"), v])
            .collect()
    }
}
