//! Standard units, schemes and constants, loaded into the root scope.
use crate::ast::Parser;
use crate::environment::Environment;
use crate::error::ParseError;
use crate::scope::ScopeId;

const PRELUDE: &str = "
unit (Metric) m meter meters metre metres: Length
unit (Metric) km kilometer kilometers kilometre kilometres: 1000 m
unit (Metric) cm centimeter centimeters centimetre centimetres: 1/100 m
unit (Metric) mm millimeter millimeters millimetre millimetres: 1/1000 m
unit (Imperial) ft foot feet: 0.3048 m
unit (Imperial) inch inches: 0.0254 m
unit (Imperial) yard yards: 0.9144 m
unit (Imperial) mile miles: 1609.344 m

unit (Metric, Imperial) s second seconds sec: Time
unit (Metric, Imperial) min minute minutes: 60 s
unit (Metric, Imperial) h hour hours hr: 3600 s
unit day days: 86400 s

unit (Metric) kg kilogram kilograms: Mass
unit (Metric) g gram grams: 1/1000 kg
unit (Imperial) lb pound pounds: 0.45359237 kg

unit radians radian rad: Angle
unit degrees degree deg: 0.017453292519943295 radians

unit K kelvin: Temperature
unit A ampere amperes amp amps: Current
unit mol mole moles: Amount

unit (Metric) N newton newtons: kg m/s^2
unit (Metric) J joule joules: N m
unit (Metric) W watt watts: J/s
unit (Metric) Pa pascal pascals: N/m^2
unit Hz hertz: /s
unit (Metric) L liter liters litre litres: 0.001 m^3
unit (Metric) hectare hectares: 10000 m^2
unit (Imperial) acre acres: 4046.8564224 m^2
unit (Metric) kph: km/h
unit (Imperial) mph: mile/h

pi = 3.141592653589793
";

/// Parses the prelude into `scope`, binding its constants there. Returns the
/// number of statements loaded.
pub fn load(env: &mut Environment, scope: ScopeId) -> Result<usize, ParseError> {
    let mut count = 0;
    for line in PRELUDE.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let node = Parser::new(env, scope).parse_statement(line)?;
        if let Some((name, defining_scope)) = node.defined_variable() {
            let name = name.to_string();
            env.scopes.set_variable(defining_scope, &name, node.clone());
        }
        count += 1;
    }
    Ok(count)
}
