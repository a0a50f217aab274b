//! Generalized Linear Model fitting for negative binomial data

mod design;
mod fitting;
mod negative_binomial;

pub use design::{build_design_matrix, check_full_rank, DesignMatrix, TREATMENT_COEF};
pub use fitting::{fit_glm, fit_single_gene, irls, GeneFit, GlmFit, GlmFitParams};
pub use negative_binomial::{nb_deviance, nb_log_likelihood, nb_mean, nb_weight, ridge_lambda, MAX_BETA, MIN_MU};
