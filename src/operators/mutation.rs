use crate::config::ParameterNode;
use crate::engine::RunState;
use crate::error::{ConfigError, EvostratError};
use crate::representation::{BinaryVector, IntegerValue, IntegerVector, Representation};
use rand::rngs::StdRng;
use rand::Rng;

/// Run information a mutation operator may consult for self-adaptation. The
/// success counter belongs to the engine; an adapting operator resets it
/// after reading a success rate.
pub struct MutationContext<'a> {
    pub state: &'a mut RunState,
    pub offspring_pop_size: usize,
    pub generation_limit: usize,
    pub rng: &'a mut StdRng,
}

/// In-place mutation of one representation. A configured operator instance is
/// long-lived: it is created once during configuration and keeps its adaptive
/// state (e.g. step size) across calls.
pub trait Mutation: Send {
    fn mutate(
        &mut self,
        representation: &mut dyn Representation,
        ctx: &mut MutationContext,
    ) -> Result<(), EvostratError>;
}

/// Random bit flip over a [`BinaryVector`]: each bit flips with probability
/// `factor * gamma / n`. With `alpha` configured the factor self-adapts every
/// `interval` generations from the success rate against `boundary`. A vector
/// mutated to all-zero gets one random bit back.
pub struct RandomBitFlip {
    gamma: f64,
    alpha: Option<f64>,
    boundary: f64,
    increase_for_higher_success_rate: bool,
    interval: usize,
    self_adaptation_factor: f64,
}

impl RandomBitFlip {
    pub const TYPE_TAG: &'static str = "RandomBitFlip";

    pub fn from_node(node: &ParameterNode) -> Result<Box<dyn Mutation>, ConfigError> {
        let gamma = node.double_param("gamma")?;
        let alpha = node.find("alpha").map(|_| node.double_param("alpha")).transpose()?;
        let interval = match node.find("intervalForSuccessRateCalculation") {
            Some(_) => node.int_param("intervalForSuccessRateCalculation")? as usize,
            None => 5,
        };
        if alpha.is_some() && interval == 0 {
            return Err(ConfigError::Invalid(
                "Success rate interval for bit flip adaptation must be greater than zero"
                    .to_string(),
            ));
        }
        let boundary = match node.find("boundaryForSelfAdaptation") {
            Some(_) => node.double_param("boundaryForSelfAdaptation")?,
            None => 0.2,
        };
        let increase = match node.find("increaseForHigherSuccessRate") {
            Some(_) => node.bool_param("increaseForHigherSuccessRate")?,
            None => true,
        };
        Ok(Box::new(Self {
            gamma,
            alpha,
            boundary,
            increase_for_higher_success_rate: increase,
            interval,
            self_adaptation_factor: 1.0,
        }))
    }

    fn self_adaptation(&mut self, ctx: &mut MutationContext) {
        let Some(alpha) = self.alpha else {
            return;
        };
        if (ctx.state.current_generation + 1) % self.interval != 0 {
            return;
        }
        let success_rate = ctx.state.current_success_counter as f64
            / (self.interval as f64 * ctx.offspring_pop_size as f64);

        if success_rate > self.boundary {
            if self.increase_for_higher_success_rate {
                self.self_adaptation_factor *= alpha;
            } else {
                self.self_adaptation_factor /= alpha;
            }
        } else if success_rate < self.boundary {
            if self.increase_for_higher_success_rate {
                self.self_adaptation_factor /= alpha;
            } else {
                self.self_adaptation_factor *= alpha;
            }
        }
        ctx.state.current_success_counter = 0;
    }
}

impl Mutation for RandomBitFlip {
    fn mutate(
        &mut self,
        representation: &mut dyn Representation,
        ctx: &mut MutationContext,
    ) -> Result<(), EvostratError> {
        let vector = representation
            .as_any_mut()
            .downcast_mut::<BinaryVector>()
            .ok_or_else(|| {
                EvostratError::Engine("Random bit flip requires a BinaryVector".to_string())
            })?;

        let length = vector.bits().len();
        let probability = self.self_adaptation_factor * self.gamma / length as f64;
        self.self_adaptation(ctx);

        log::debug!("Random bit flip on {} (p = {:.4})", vector.encode(), probability);
        for bit in vector.bits_mut() {
            if ctx.rng.gen::<f64>() < probability {
                *bit = !*bit;
            }
        }
        vector.repair_all_zero(ctx.rng);
        Ok(())
    }
}

/// Integer mutation after Rudolph (PPSN III, 1994): a two-sided geometric
/// step with an expected step size that either follows a decay schedule or
/// self-adapts by the 1/5 success rule.
pub struct IntegerMutation {
    probability: f64,
    step_size: f64,
    /// 1/5-rule factor; `None` switches to the decay schedule below.
    alpha: Option<f64>,
    adaptation_function_parameter: f64,
    expected_step: Option<f64>,
}

impl IntegerMutation {
    pub const TYPE_TAG: &'static str = "IntegerMutation";

    pub fn from_node(node: &ParameterNode) -> Result<Box<dyn Mutation>, ConfigError> {
        let probability = node.double_param("Probability")?;
        let step_size = match node.find("Step size") {
            Some(_) => node.double_param("Step size")?,
            None => 1.0,
        };
        let alpha = node
            .find("alpha")
            .map(|_| node.double_param("alpha"))
            .transpose()?
            .filter(|a| *a > 0.0);
        let adaptation_function_parameter = match node.find("Adaptation function parameter") {
            Some(_) => node.double_param("Adaptation function parameter")?,
            None => 0.5,
        };
        Ok(Box::new(Self {
            probability,
            step_size,
            alpha,
            adaptation_function_parameter,
            expected_step: None,
        }))
    }

    fn update_expected_step(&mut self, min: i64, max: i64, ctx: &mut MutationContext) -> f64 {
        // First use: start at half of the representation's range.
        let mut step = self
            .expected_step
            .unwrap_or_else(|| (max - min) as f64 / 2.0);

        match self.alpha {
            None => {
                // Deterministic decay schedule over the planned generations.
                let g = ctx.state.current_generation as f64;
                let horizon = (ctx.generation_limit.max(2) - 1) as f64;
                let decay = 15000.0 * self.adaptation_function_parameter.powf(g);
                step = decay + g * (1.0 - decay) / horizon;
            }
            Some(alpha) => {
                // 1/5 success rule, applied every 5th generation.
                if (ctx.state.current_generation + 1) % 5 == 0 {
                    let success_rate = ctx.state.current_success_counter as f64
                        / (5.0 * ctx.offspring_pop_size as f64);
                    if success_rate > 0.2 {
                        step *= alpha;
                    } else if success_rate < 0.2 {
                        step /= alpha;
                    }
                    ctx.state.current_success_counter = 0;
                }
            }
        }

        let step = step.max(1.0);
        self.expected_step = Some(step);
        step
    }

    /// Two-sided geometric draw after Rudolph: the difference of two
    /// geometric variables, nudged away from zero.
    fn geometric_step(&self, expected: f64, rng: &mut StdRng) -> i64 {
        let p = 1.0 - expected / ((1.0 + expected * expected).sqrt() + 1.0);
        let u1: f64 = rng.gen();
        let u2: f64 = rng.gen();
        let g1 = ((1.0 - u1).ln() / (1.0 - p).ln()).floor() as i64;
        let g2 = ((1.0 - u2).ln() / (1.0 - p).ln()).floor() as i64;
        let mut g = g1 - g2;
        if g == 0 {
            g = if rng.gen::<f64>() > 0.5 { 1 } else { -1 };
        } else {
            g += g.signum();
        }
        (g as f64 * self.step_size) as i64
    }
}

impl Mutation for IntegerMutation {
    fn mutate(
        &mut self,
        representation: &mut dyn Representation,
        ctx: &mut MutationContext,
    ) -> Result<(), EvostratError> {
        if let Some(value) = representation.as_any_mut().downcast_mut::<IntegerValue>() {
            if ctx.rng.gen::<f64>() >= self.probability {
                return Ok(());
            }
            let expected = self.update_expected_step(value.min(), value.max(), ctx);
            let stepped = value.value() + self.geometric_step(expected, ctx.rng);
            log::debug!(
                "Integer mutation: {} -> {} (expected step {:.2})",
                value.value(),
                stepped,
                expected
            );
            value.set_value(stepped);
            return Ok(());
        }

        if let Some(vector) = representation.as_any_mut().downcast_mut::<IntegerVector>() {
            let expected = self.update_expected_step(vector.min(), vector.max(), ctx);
            for index in 0..vector.values().len() {
                if ctx.rng.gen::<f64>() >= self.probability {
                    continue;
                }
                let stepped = vector.values()[index] + self.geometric_step(expected, ctx.rng);
                vector.set_component(index, stepped);
            }
            return Ok(());
        }

        Err(EvostratError::Engine(
            "Integer mutation requires an IntegerValue or IntegerVector".to_string(),
        ))
    }
}
