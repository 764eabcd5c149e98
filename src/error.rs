use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("alignment {alignment} is not a power of two")]
  InvalidAlignment { alignment: usize },

  #[error("out of memory allocating {size} bytes aligned to {alignment}")]
  OutOfMemory { size: usize, alignment: usize },
}

pub type Result<T, E = AllocError> = std::result::Result<T, E>;
