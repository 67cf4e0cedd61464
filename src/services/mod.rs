pub(crate) mod answer_batch;
pub(crate) mod outcome;
