//! Ready-made QLoRA runs. Callers fill in model, output and data and tweak
//! the rest on the returned value.

use std::collections::BTreeMap;

use super::{FinetuningType, LauncherConfig, LrScheduler, Precision, RunConfig, Stage};

/// Supervised fine-tune: 4-bit LoRA on all linear layers, cosine schedule,
/// NEFTune noise on the embeddings.
pub fn sft(model: &str, output_dir: &str, template: &str, dataset: &[String]) -> RunConfig {
    RunConfig {
        stage: Stage::Sft,
        do_train: true,
        model_name_or_path: model.to_string(),
        output_dir: output_dir.to_string(),
        overwrite_output_dir: true,
        dataset: dataset.to_vec(),
        dataset_dir: None,
        template: template.to_string(),
        cutoff_len: 2048,
        preprocessing_num_workers: Some(16),
        per_device_train_batch_size: 2,
        gradient_accumulation_steps: 8,
        lr_scheduler_type: LrScheduler::Cosine,
        logging_steps: 10,
        save_steps: 1000,
        save_total_limit: Some(3),
        optim: "adamw_torch".into(),
        learning_rate: 5e-5,
        num_train_epochs: 3.0,
        warmup_ratio: 0.03,
        neftune_noise_alpha: Some(5.0),
        precision: Precision::Bf16,
        dpo_beta: None,
        finetuning_type: FinetuningType::Lora,
        lora_rank: 8,
        lora_alpha: Some(16),
        lora_dropout: 0.05,
        lora_target: vec!["all".into()],
        quantization_bit: Some(4),
        rope_scaling: None,
        use_fast_tokenizer: true,
        report_to: "none".into(),
        extra: BTreeMap::new(),
        launcher: LauncherConfig::default(),
    }
}

/// Preference tuning on top of an SFT checkpoint. Lower learning rate, one
/// epoch, no NEFTune.
pub fn dpo(model: &str, output_dir: &str, template: &str, dataset: &[String]) -> RunConfig {
    RunConfig {
        stage: Stage::Dpo,
        learning_rate: 5e-6,
        num_train_epochs: 1.0,
        warmup_ratio: 0.1,
        neftune_noise_alpha: None,
        dpo_beta: Some(0.1),
        save_steps: 500,
        ..sft(model, output_dir, template, dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<String> {
        vec!["identity".to_string()]
    }

    #[test]
    fn presets_validate() {
        let s = sft("/models/base", "saves/sft", "qwen", &data());
        s.validate().unwrap();
        let d = dpo("saves/sft-merged", "saves/dpo", "aris", &data());
        d.validate().unwrap();

        let o = d.to_options();
        assert_eq!(o["stage"], "dpo");
        assert_eq!(o["dpo_beta"], "0.1");
        assert_eq!(o["quantization_bit"], "4");
        assert!(!o.contains_key("neftune_noise_alpha"));
    }

    #[test]
    fn preset_survives_yaml() {
        let s = sft("/models/base", "saves/sft", "llama3", &data());
        let text = s.to_yaml().unwrap();
        let back: RunConfig = serde_yaml_ng::from_str(&text).unwrap();
        assert_eq!(back, s);
    }
}
