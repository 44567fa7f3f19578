// HTTP boundary: request body intake and JSON envelope responses.
pub(crate) mod body;
pub(crate) mod respond;
