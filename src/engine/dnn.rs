use super::InferenceEngine;
use crate::error::Error;
use opencv::{
    core::{Mat, Scalar, CV_32F},
    dnn::{self, Net},
    prelude::*,
};
use std::{convert::TryFrom, path::Path};
use tracing::{debug, info};

/// An engine backed by OpenCV's DNN module, which reads TFLite and ONNX models.
pub struct DnnEngine {
    net: Net,
    input_shape: Vec<usize>,
    input_dims: Vec<i32>,
    output_len: usize,
}

impl DnnEngine {
    pub fn new<P>(model_path: P, input_shape: Vec<usize>, output_len: usize) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let model_path = model_path.as_ref();
        let path_str = model_path
            .to_str()
            .ok_or_else(|| Error::GetModelPathAsStr(model_path.to_path_buf()))?;
        let net = dnn::read_net_def(path_str)
            .map_err(|e| Error::LoadModel(e, model_path.to_path_buf()))?;
        let input_dims = input_shape
            .iter()
            .map(|&d| i32::try_from(d).map_err(Error::ConvertDimToI32))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            message = "loaded model",
            path = %model_path.display(),
            ?input_shape,
            output_len
        );

        Ok(Self {
            net,
            input_shape,
            input_dims,
            output_len,
        })
    }
}

impl InferenceEngine for DnnEngine {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, Error> {
        let mut blob = Mat::new_nd_with_default(&self.input_dims, CV_32F, Scalar::all(0.0))
            .map_err(Error::CreateBlob)?;
        blob.data_typed_mut::<f32>()
            .map_err(Error::CreateBlob)?
            .copy_from_slice(input);

        self.net.set_input_def(&blob).map_err(Error::Forward)?;
        let output = self.net.forward_single_def().map_err(Error::Forward)?;
        let values = output.data_typed::<f32>().map_err(Error::ReadOutput)?;
        Ok(values.to_vec())
    }

    fn close(self: Box<Self>) {
        debug!(message = "releasing model", input_shape = ?self.input_shape);
    }
}
