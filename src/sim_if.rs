use crate::native;
use crate::signal::SimObject;
use crate::{RstbErr, SimpleResult};
use lazy_static::lazy_static;
use log::Level;

lazy_static! {
    pub static ref SIM_IF: Box<dyn SimIf + Sync> = new_interface();
}

fn new_interface() -> Box<dyn SimIf + Sync> {
    Box::new(native::Native)
}

/// Callbacks a host simulator must be able to deliver.
///
/// `Time` is relative to the current time when registering; the host reports back the
/// absolute time it fired at. `Edge` stays registered until cancelled, `ReadWrite` and
/// `ReadOnly` fire once.
#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimpleResult<()>;
    fn get_value(&self, obj: &SimObject) -> SimpleResult<u32>;
    fn get_object_by_name(&self, name: &str) -> SimpleResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> SimpleResult<String>;
    fn get_root_object(&self) -> SimpleResult<SimObject>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log_at(&self, level: Level, msg: &str);
    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()>;

    fn log(&self, msg: &str) {
        self.log_at(Level::Info, msg)
    }
    fn debug(&self, msg: &str) {
        self.log_at(Level::Debug, msg)
    }
    fn warn(&self, msg: &str) {
        self.log_at(Level::Warn, msg)
    }
    fn error(&self, msg: &str) {
        self.log_at(Level::Error, msg)
    }
    fn get_sim_time(&self, unit: &str) -> SimpleResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        Ok(ldexp10(t, precision - time_scale(unit)?))
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> SimpleResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps % 1.0 == 0.0 {
            Ok(steps as u64)
        } else {
            Err(RstbErr::TimeRounding {
                time: time.to_string(),
                unit: unit.to_string(),
            })
        }
    }
}

pub(crate) fn time_scale(unit: &str) -> SimpleResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(RstbErr::InvalidTimeUnit(unit.to_string())),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("fs", -15)]
    #[test_case("ns", -9)]
    #[test_case("sec", 0)]
    fn known_units(unit: &str, scale: i8) {
        assert_eq!(time_scale(unit), Ok(scale));
    }

    #[test]
    fn unknown_unit() {
        assert_eq!(
            time_scale("min"),
            Err(RstbErr::InvalidTimeUnit("min".to_string()))
        );
    }

    #[test]
    fn ldexp10_scales_both_ways() {
        assert_eq!(ldexp10(3.0, 3), 3000.0);
        assert_eq!(ldexp10(1500.0, -3), 1.5);
    }
}
