//! Basic block id assignment.

use std::collections::HashMap;

use crate::bytecode::BlockId;
use crate::core::error::{CompileError, CompileResult};
use crate::ir::{BlockRef, FunctionBuilder, FunctionId};

/// Maps each block of one function to its position in emission order.
///
/// Built once per function compile, before any block is lowered, so ids do
/// not depend on how far compilation has progressed.
#[derive(Debug)]
pub struct BasicBlockFinder {
    function: FunctionId,
    ids: HashMap<BlockRef, BlockId>,
}

impl BasicBlockFinder {
    pub fn new(function: &FunctionBuilder) -> CompileResult<Self> {
        let ids = function
            .block_refs()
            .enumerate()
            .map(|(position, block)| {
                BlockId::try_from(position)
                    .map(|id| (block, id))
                    .map_err(|_| CompileError::TooManyBlocks {
                        count: function.basic_blocks().len(),
                    })
            })
            .collect::<CompileResult<HashMap<_, _>>>()?;

        Ok(Self {
            function: function.id(),
            ids,
        })
    }

    /// Id of `block`. Blocks of any other function are an internal error.
    pub fn find(&self, block: BlockRef) -> CompileResult<BlockId> {
        self.ids
            .get(&block)
            .copied()
            .ok_or(CompileError::BlockNotFound {
                block,
                function: self.function,
            })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
