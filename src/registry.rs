//! Explicit operator table consulted by graph builders.
//!
//! Each entry pairs a shape-inference function with a factory, keyed by the
//! operator name. [`CPU_REGISTRY`] holds the built-in operators for
//! [`CpuBackend`]; builders that need other entries construct their own
//! [`Registry`] and register them explicitly.

use crate::backend::cpu::CpuBackend;
use crate::backend::Backend;
use crate::error::Error;
use crate::operator::{CustomOperator, KMaxPoolConfig};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// Operator attributes as string key/value pairs.
pub type Params<'a> = [(&'a str, &'a str)];

/// Input and output shapes resolved by shape inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredShapes {
    pub inputs: Vec<Vec<usize>>,
    pub outputs: Vec<Vec<usize>>,
}

pub type InferShapeFn = fn(&Params<'_>, &[Vec<usize>]) -> Result<InferredShapes, Error>;

#[allow(type_alias_bounds)]
pub type CreateFn<B: Backend> = fn(&Params<'_>) -> Result<Box<dyn CustomOperator<B>>, Error>;

pub struct OperatorDef<B: Backend> {
    pub name: &'static str,
    pub arguments: &'static [&'static str],
    pub outputs: &'static [&'static str],
    pub infer_shape: InferShapeFn,
    pub create: CreateFn<B>,
}

impl<B: Backend> fmt::Debug for OperatorDef<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorDef")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("outputs", &self.outputs)
            .field("infer_shape", &"<fn>")
            .field("create", &"<fn>")
            .finish()
    }
}

fn kmax_pool_infer_shape(
    params: &Params<'_>,
    in_shapes: &[Vec<usize>],
) -> Result<InferredShapes, Error> {
    let config = KMaxPoolConfig::from_params(params.iter().copied())?;
    if in_shapes.len() != 1 {
        return Err(Error::InvalidOperation(format!(
            "{} expects 1 input shape, got {}",
            KMaxPoolConfig::OP_NAME,
            in_shapes.len()
        )));
    }
    let output = config.infer_shape(&in_shapes[0])?;
    Ok(InferredShapes {
        inputs: in_shapes.to_vec(),
        outputs: vec![output.to_vec()],
    })
}

fn kmax_pool_create<B: Backend + 'static>(
    params: &Params<'_>,
) -> Result<Box<dyn CustomOperator<B>>, Error> {
    let config = KMaxPoolConfig::from_params(params.iter().copied())?;
    Ok(Box::new(config.create_operator::<B>()))
}

/// Table entry for the order-preserving k-max pooling operator.
pub fn kmax_pool_def<B: Backend + 'static>() -> OperatorDef<B> {
    OperatorDef {
        name: KMaxPoolConfig::OP_NAME,
        arguments: KMaxPoolConfig::ARGUMENTS,
        outputs: KMaxPoolConfig::OUTPUTS,
        infer_shape: kmax_pool_infer_shape,
        create: kmax_pool_create::<B>,
    }
}

#[derive(Debug)]
pub struct Registry<B: Backend> {
    ops: HashMap<&'static str, OperatorDef<B>>,
}

impl<B: Backend + 'static> Registry<B> {
    pub fn new() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in operator.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.ops.insert(KMaxPoolConfig::OP_NAME, kmax_pool_def());
        registry
    }

    /// Adds `def`; names must be unique.
    pub fn register(&mut self, def: OperatorDef<B>) -> Result<(), Error> {
        if self.ops.contains_key(def.name) {
            return Err(Error::InvalidOperation(format!(
                "operator {:?} is already registered",
                def.name
            )));
        }
        debug_println!("registering operator {}", def.name);
        self.ops.insert(def.name, def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&OperatorDef<B>, Error> {
        self.ops
            .get(name)
            .ok_or_else(|| Error::UnknownOperator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ops.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn infer_shape(
        &self,
        name: &str,
        params: &Params<'_>,
        in_shapes: &[Vec<usize>],
    ) -> Result<InferredShapes, Error> {
        let def = self.get(name)?;
        (def.infer_shape)(params, in_shapes)
    }

    pub fn create(
        &self,
        name: &str,
        params: &Params<'_>,
    ) -> Result<Box<dyn CustomOperator<B>>, Error> {
        let def = self.get(name)?;
        debug_println!("creating operator {} with params {:?}", name, params);
        (def.create)(params)
    }
}

impl<B: Backend + 'static> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Built-in operators for the CPU backend.
    pub static ref CPU_REGISTRY: Registry<CpuBackend> = Registry::with_builtin();
}
