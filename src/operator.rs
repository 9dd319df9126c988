//! Operator-level view of k-max pooling: configuration, shape inference and
//! a stateful instance that plugs into a host execution engine.

use crate::backend::Backend;
use crate::error::Error;
use crate::ops::{self, OpReq};
use crate::selection::Selection;
use crate::util;
use std::marker::PhantomData;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration of a k-max pooling operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct KMaxPoolConfig {
    k: usize,
}

impl KMaxPoolConfig {
    /// Name under which the operator is registered.
    pub const OP_NAME: &'static str = "k_max_pool";
    pub(crate) const ARGUMENTS: &'static [&'static str] = &["data"];
    pub(crate) const OUTPUTS: &'static [&'static str] = &["output"];

    pub fn new(k: usize) -> Result<Self, Error> {
        if k == 0 {
            return Err(Error::InvalidParameter(
                "k must be a positive integer".to_string(),
            ));
        }
        Ok(Self { k })
    }

    /// Builds a configuration from string key/value parameters, the form in
    /// which graph builders pass operator attributes (`k = "4"`).
    pub fn from_params<'a, I>(params: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut k = None;
        for (key, value) in params {
            match key {
                "k" => {
                    let parsed = value.trim().parse::<i64>().map_err(|e| {
                        Error::InvalidParameter(format!(
                            "k = {:?} is not an integer: {}",
                            value, e
                        ))
                    })?;
                    if parsed <= 0 {
                        return Err(Error::InvalidParameter(format!(
                            "k must be a positive integer, got {}",
                            parsed
                        )));
                    }
                    let parsed = usize::try_from(parsed).map_err(|_| {
                        Error::InvalidParameter(format!("k = {} does not fit in usize", parsed))
                    })?;
                    k = Some(parsed);
                }
                other => {
                    return Err(Error::InvalidParameter(format!(
                        "unknown parameter {:?} for {}",
                        other,
                        Self::OP_NAME
                    )))
                }
            }
        }
        let k = k.ok_or_else(|| {
            Error::InvalidParameter(format!("missing parameter \"k\" for {}", Self::OP_NAME))
        })?;
        Self::new(k)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn list_arguments(&self) -> &'static [&'static str] {
        Self::ARGUMENTS
    }

    pub fn list_outputs(&self) -> &'static [&'static str] {
        Self::OUTPUTS
    }

    /// Output shape for an `[N, C, H, W]` input: `[N, C, k, W]`.
    ///
    /// H is not compared against k here; that check happens at forward time.
    pub fn infer_shape(&self, input_shape: &[usize]) -> Result<[usize; 4], Error> {
        let [n, c, _, w] = util::nchw(input_shape)?;
        Ok([n, c, self.k, w])
    }

    pub fn create_operator<B: Backend>(&self) -> KMaxPool<B> {
        KMaxPool {
            config: *self,
            selection: None,
            _backend: PhantomData,
        }
    }

    #[cfg(feature = "serialization")]
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    #[cfg(feature = "serialization")]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let raw: Self =
            serde_json::from_str(json).map_err(|e| Error::DeserializationError(e.to_string()))?;
        Self::new(raw.k)
    }
}

/// Execution contract between an operator and the engine driving it.
///
/// Buffers are allocated by the caller; each output slot comes with an
/// [`OpReq`] telling the operator whether to skip, overwrite or accumulate.
pub trait CustomOperator<B: Backend> {
    fn forward(
        &mut self,
        is_train: bool,
        req: &[OpReq],
        in_data: &[&B::Storage],
        out_data: &mut [B::Storage],
    ) -> Result<(), Error>;

    fn backward(
        &mut self,
        req: &[OpReq],
        out_grad: &[&B::Storage],
        in_data: &[&B::Storage],
        in_grad: &mut [B::Storage],
    ) -> Result<(), Error>;
}

/// A k-max pooling instance that remembers the selection of its last
/// training forward pass until the matching backward pass consumes it.
///
/// Forward and backward both take `&mut self`, so one instance can never
/// have two passes in flight at once.
#[derive(Debug, Clone)]
pub struct KMaxPool<B: Backend> {
    config: KMaxPoolConfig,
    selection: Option<Selection>,
    _backend: PhantomData<B>,
}

impl<B: Backend> KMaxPool<B> {
    pub fn new(k: usize) -> Result<Self, Error> {
        Ok(KMaxPoolConfig::new(k)?.create_operator())
    }

    pub fn config(&self) -> &KMaxPoolConfig {
        &self.config
    }

    pub fn k(&self) -> usize {
        self.config.k
    }

    /// True between a forward pass and the backward pass that consumes it.
    pub fn is_ready_for_backward(&self) -> bool {
        self.selection.is_some()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Pools `input` and caches the selection, replacing any earlier one.
    /// A failed forward leaves nothing cached.
    pub fn forward(&mut self, input: &B::Storage) -> Result<B::Storage, Error> {
        self.selection = None;
        let (output, selection) = ops::kmax_pool::<B>(input, self.config.k)?;
        self.selection = Some(selection);
        Ok(output)
    }

    /// Routes `grad_output` through the cached selection.
    ///
    /// Fails with [`Error::StaleState`] when no forward pass is pending. The
    /// selection is released only when the gradient is produced successfully.
    pub fn backward(&mut self, grad_output: &B::Storage) -> Result<B::Storage, Error> {
        let selection = self.selection.as_ref().ok_or(Error::StaleState)?;
        let grad_input = ops::kmax_pool_backward::<B>(grad_output, selection)?;
        self.selection = None;
        Ok(grad_input)
    }
}

fn check_arity(what: &str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::InvalidOperation(format!(
            "{} expects {} {}, got {}",
            KMaxPoolConfig::OP_NAME,
            expected,
            what,
            actual
        )));
    }
    Ok(())
}

fn check_input_shape<B: Backend>(selection: &Selection, storage: &B::Storage) -> Result<(), Error> {
    let expected = selection.input_shape();
    if B::shape(storage) != expected.as_slice() {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            actual: B::shape(storage).to_vec(),
        });
    }
    Ok(())
}

impl<B: Backend> CustomOperator<B> for KMaxPool<B> {
    /// Inference passes (`is_train == false`) drop any cached selection, so a
    /// following backward reports [`Error::StaleState`].
    fn forward(
        &mut self,
        is_train: bool,
        req: &[OpReq],
        in_data: &[&B::Storage],
        out_data: &mut [B::Storage],
    ) -> Result<(), Error> {
        self.selection = None;
        check_arity("inputs", 1, in_data.len())?;
        check_arity("outputs", 1, out_data.len())?;
        check_arity("output requests", 1, req.len())?;

        let selection =
            ops::kmax_pool_into::<B>(in_data[0], self.config.k, &mut out_data[0], req[0])?;
        self.selection = if is_train { Some(selection) } else { None };
        Ok(())
    }

    fn backward(
        &mut self,
        req: &[OpReq],
        out_grad: &[&B::Storage],
        in_data: &[&B::Storage],
        in_grad: &mut [B::Storage],
    ) -> Result<(), Error> {
        check_arity("output gradients", 1, out_grad.len())?;
        check_arity("inputs", 1, in_data.len())?;
        check_arity("input gradients", 1, in_grad.len())?;
        check_arity("input gradient requests", 1, req.len())?;

        let selection = self.selection.as_ref().ok_or(Error::StaleState)?;
        check_input_shape::<B>(selection, in_data[0])?;
        if req[0] != OpReq::Null {
            check_input_shape::<B>(selection, &in_grad[0])?;
        }
        ops::kmax_pool_backward_into::<B>(out_grad[0], selection, &mut in_grad[0], req[0])?;
        self.selection = None;
        Ok(())
    }
}
