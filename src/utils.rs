use candle_core::{Result, Tensor};

pub fn mask_to_index(mask: &Tensor) -> Result<Tensor> {
    let indices: Vec<u32> = mask
        .to_dtype(candle_core::DType::U8)?
        .to_vec1()?
        .into_iter()
        .enumerate()
        .filter_map(|(idx, m): (_, u8)| if m == 0 { None } else { Some(idx as u32) })
        .collect();
    let len = indices.len();
    Tensor::from_vec(indices, len, mask.device())
}

/// Fraction of rows whose argmax equals the label.
pub fn accuracy(logits: &Tensor, labels: &Tensor) -> Result<f32> {
    logits
        .argmax(candle_core::D::Minus1)?
        .eq(labels)?
        .to_dtype(candle_core::DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn mask_selects_set_positions() -> Result<()> {
        let mask = Tensor::new(&[0u8, 1, 1, 0, 1], &Device::Cpu)?;
        assert_eq!(mask_to_index(&mask)?.to_vec1::<u32>()?, vec![1, 2, 4]);
        let empty = Tensor::new(&[0u8, 0], &Device::Cpu)?;
        assert_eq!(mask_to_index(&empty)?.dims(), &[0]);
        Ok(())
    }

    #[test]
    fn accuracy_counts_argmax_hits() -> Result<()> {
        let logits = Tensor::new(&[[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4], [0.3, 0.7]], &Device::Cpu)?;
        let labels = Tensor::new(&[0u32, 1, 1, 1], &Device::Cpu)?;
        assert!((accuracy(&logits, &labels)? - 0.75).abs() < 1e-6);
        Ok(())
    }
}
