use candle_core::{IndexOp, Tensor};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarMap};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::TrainerConfig;
use crate::datasets::NodeClassificationDataset;
use crate::models::HeteroGnnModule;
use crate::utils::accuracy;
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub train_acc: f32,
    pub val_acc: f32,
    pub test_acc: f32,
}

#[derive(Clone, Debug)]
pub struct TrainReport {
    /// Stats of the epoch with the lowest validation loss.
    pub best: EpochStats,
    pub history: Vec<EpochStats>,
    pub early_stopped: bool,
}

/// Full-batch node classification with AdamW and early stopping on validation loss.
pub struct NodeClassificationTrainer {
    config: TrainerConfig,
}
impl NodeClassificationTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    fn logits<D: NodeClassificationDataset>(
        model: &dyn HeteroGnnModule,
        dataset: &D,
        train: bool,
    ) -> Result<Tensor> {
        model
            .forward_t(dataset.graph(), train)?
            .remove(model.category())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("model produced no output for `{}`", model.category()))
            })
    }

    fn evaluate<D: NodeClassificationDataset>(
        model: &dyn HeteroGnnModule,
        dataset: &D,
        epoch: usize,
        train_loss: f32,
    ) -> Result<EpochStats> {
        let logits = Self::logits(model, dataset, false)?;
        let y = dataset.labels();
        let split_acc = |index: &Tensor| -> Result<f32> { Ok(accuracy(&logits.i(index)?, &y.i(index)?)?) };
        let val_loss = loss::cross_entropy(
            &logits.i(dataset.val_index())?,
            &y.i(dataset.val_index())?,
        )?
        .to_scalar::<f32>()?;
        Ok(EpochStats {
            epoch,
            train_loss,
            val_loss,
            train_acc: split_acc(dataset.train_index())?,
            val_acc: split_acc(dataset.val_index())?,
            test_acc: split_acc(dataset.test_index())?,
        })
    }

    pub fn train<D: NodeClassificationDataset>(
        &self,
        model: &dyn HeteroGnnModule,
        varmap: &VarMap,
        dataset: &D,
    ) -> Result<TrainReport> {
        if self.config.max_epoch == 0 {
            return Err(Error::InvalidConfig("max_epoch must be positive".into()));
        }
        if model.category() != dataset.category() {
            return Err(Error::InvalidConfig(format!(
                "model predicts `{}` but the dataset labels `{}`",
                model.category(),
                dataset.category()
            )));
        }
        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: self.config.lr,
                weight_decay: self.config.weight_decay,
                ..Default::default()
            },
        )?;

        let pbar = if self.config.progress_bar {
            let pbar = ProgressBar::new(self.config.max_epoch as u64);
            pbar.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pbar
        } else {
            ProgressBar::hidden()
        };

        let train_index = dataset.train_index();
        let train_y = dataset.labels().i(train_index)?;
        let mut history: Vec<EpochStats> = Vec::new();
        let mut best: Option<EpochStats> = None;
        let mut stale = 0;
        let mut early_stopped = false;
        for epoch in 0..self.config.max_epoch {
            let logits = Self::logits(model, dataset, true)?;
            let loss = loss::cross_entropy(&logits.i(train_index)?, &train_y)?;
            optimizer.backward_step(&loss)?;

            let stats = Self::evaluate(model, dataset, epoch, loss.to_scalar::<f32>()?)?;
            info!(?stats, "epoch finished");
            pbar.set_message(format!(
                "train loss {:.4} val loss {:.4} val acc {:5.2}%",
                stats.train_loss,
                stats.val_loss,
                100.0 * stats.val_acc
            ));
            pbar.inc(1);

            let improved = best.as_ref().map_or(true, |b| stats.val_loss < b.val_loss);
            if improved {
                best = Some(stats.clone());
                stale = 0;
            } else {
                stale += 1;
            }
            history.push(stats);
            if !improved && stale >= self.config.patience.max(1) {
                info!(epoch, patience = self.config.patience, "early stopping");
                early_stopped = true;
                break;
            }
        }
        pbar.finish_and_clear();

        let best = best.ok_or_else(|| Error::InvalidConfig("no epoch was run".into()))?;
        info!(
            best_epoch = best.epoch,
            val_loss = best.val_loss,
            val_acc = best.val_acc,
            test_acc = best.test_acc,
            "training finished"
        );
        Ok(TrainReport {
            best,
            history,
            early_stopped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelArgs;
    use crate::graph::HeteroGraph;
    use crate::models::{ModelRegistry, FEATURE_FIELD};
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    struct Toy {
        graph: HeteroGraph,
        y: Tensor,
        train: Tensor,
        val: Tensor,
        test: Tensor,
    }
    impl NodeClassificationDataset for Toy {
        fn graph(&self) -> &HeteroGraph {
            &self.graph
        }
        fn category(&self) -> &str {
            "author"
        }
        fn num_classes(&self) -> usize {
            2
        }
        fn labels(&self) -> &Tensor {
            &self.y
        }
        fn train_index(&self) -> &Tensor {
            &self.train
        }
        fn val_index(&self) -> &Tensor {
            &self.val
        }
        fn test_index(&self) -> &Tensor {
            &self.test
        }
    }

    fn toy() -> Result<Toy> {
        let dev = &Device::Cpu;
        let mut graph = HeteroGraph::new([("author", 6), ("paper", 2)], dev);
        graph.add_edges(("author", "write", "paper"), &[(0, 0), (1, 0), (2, 0), (3, 1), (4, 1), (5, 1)])?;
        graph.add_edges(("paper", "written-by", "author"), &[(0, 0), (0, 1), (0, 2), (1, 3), (1, 4), (1, 5)])?;
        let x = Tensor::new(
            &[[1f32, 0.], [1., 0.1], [0.9, 0.], [0., 1.], [0.1, 1.], [0., 0.9]],
            dev,
        )?;
        graph.set_node_data("author", FEATURE_FIELD, x)?;
        Ok(Toy {
            graph,
            y: Tensor::new(&[0u32, 0, 0, 1, 1, 1], dev)?,
            train: Tensor::new(&[0u32, 3], dev)?,
            val: Tensor::new(&[1u32, 4], dev)?,
            test: Tensor::new(&[2u32, 5], dev)?,
        })
    }

    fn model(toy: &Toy, varmap: &VarMap) -> Result<Box<dyn HeteroGnnModule>> {
        let vs = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        let args = ModelArgs {
            category: "author".into(),
            in_dim: 2,
            hidden_dim: 4,
            out_dim: 2,
            num_heads: vec![2],
            dropout: 0.0,
            ..Default::default()
        };
        ModelRegistry::default().build("HAN", &args, &toy.graph, vs)
    }

    #[test]
    fn runs_and_reports_best_epoch() -> Result<()> {
        let toy = toy()?;
        let varmap = VarMap::new();
        let model = model(&toy, &varmap)?;
        let trainer = NodeClassificationTrainer::new(TrainerConfig {
            max_epoch: 5,
            patience: 100,
            progress_bar: false,
            ..Default::default()
        });
        let report = trainer.train(model.as_ref(), &varmap, &toy)?;
        assert_eq!(report.history.len(), 5);
        assert!(!report.early_stopped);
        assert!(report.history.iter().all(|s| s.train_loss.is_finite()));
        let min = report.history.iter().map(|s| s.val_loss).fold(f32::INFINITY, f32::min);
        assert_eq!(report.best.val_loss, min);
        Ok(())
    }

    #[test]
    fn zero_patience_stops_after_first_non_improvement() -> Result<()> {
        let toy = toy()?;
        let varmap = VarMap::new();
        let model = model(&toy, &varmap)?;
        let trainer = NodeClassificationTrainer::new(TrainerConfig {
            max_epoch: 50,
            lr: 0.0,
            weight_decay: 0.0,
            patience: 0,
            progress_bar: false,
        });
        // with lr = 0 the second epoch repeats the first loss
        let report = trainer.train(model.as_ref(), &varmap, &toy)?;
        assert!(report.early_stopped);
        assert_eq!(report.history.len(), 2);
        assert_eq!(report.best.epoch, 0);
        Ok(())
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_epoch_is_logged_at_info() -> Result<()> {
        let toy = toy()?;
        let varmap = VarMap::new();
        let model = model(&toy, &varmap)?;
        let trainer = NodeClassificationTrainer::new(TrainerConfig {
            max_epoch: 3,
            progress_bar: false,
            ..Default::default()
        });
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || trainer.train(model.as_ref(), &varmap, &toy))?;

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("epoch finished").count(), 3);
        assert!(logs.lines().filter(|l| l.contains("epoch finished")).all(|l| l.contains("INFO")));
        Ok(())
    }

    #[test]
    fn rejects_empty_schedule() -> Result<()> {
        let toy = toy()?;
        let varmap = VarMap::new();
        let model = model(&toy, &varmap)?;
        let trainer = NodeClassificationTrainer::new(TrainerConfig {
            max_epoch: 0,
            ..Default::default()
        });
        assert!(matches!(
            trainer.train(model.as_ref(), &varmap, &toy),
            Err(Error::InvalidConfig(_))
        ));
        Ok(())
    }
}
