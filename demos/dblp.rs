use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use tracing::info;

use candle_han::config::{ExperimentConfig, ModelArgs, TrainerConfig};
use candle_han::datasets::{Dblp, NodeClassificationDataset};
use candle_han::graph::HeteroGraphView;
use candle_han::models::{ModelRegistry, FEATURE_FIELD};
use candle_han::trainer::NodeClassificationTrainer;

// cargo run --example dblp [config.json]
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let device = Device::cuda_if_available(0)?;

    // load dataset
    let dblp = Dblp::from_file("datasets/dblp.npz", &device)?;
    let in_dim = dblp.graph().node_data(dblp.category(), FEATURE_FIELD)?.dims()[1];

    let config = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig {
            model: "HAN".into(),
            args: ModelArgs {
                category: dblp.category().to_owned(),
                in_dim,
                hidden_dim: 8,
                out_dim: dblp.num_classes(),
                num_heads: vec![8],
                dropout: 0.6,
                ..Default::default()
            },
            trainer: TrainerConfig::default(),
        },
    };

    // create the model
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = ModelRegistry::default().build(&config.model, &config.args, dblp.graph(), vs)?;

    // training loop
    let report = NodeClassificationTrainer::new(config.trainer).train(model.as_ref(), &varmap, &dblp)?;
    info!(epochs = report.history.len(), early_stopped = report.early_stopped, "done");
    println!(
        "Best epoch: {:3} Val loss: {:8.5} Train accuracy {:5.2}% Val accuracy {:5.2}% Test accuracy: {:5.2}%",
        report.best.epoch,
        report.best.val_loss,
        100.0 * report.best.train_acc,
        100.0 * report.best.val_acc,
        100.0 * report.best.test_acc,
    );
    Ok(())
}
