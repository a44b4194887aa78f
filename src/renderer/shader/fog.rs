// Distance fog shared by every vertex variant. Fog params are (start, end) in x/y.

use super::compose::{Declaration, Snippet};

pub const UNIFORM_FOG_PARAMS: Declaration = Declaration::new("fog_params", "vec4<f32>");

pub const VARYING_FOG_FACTOR: &str = "v_fog_factor";

pub const FUNCTION_CALCULATE_FOG_FACTOR: &str = "
fn calculate_fog_factor(params: vec4<f32>, distance: f32) -> f32 {
    return clamp((distance - params.x) / max(params.y - params.x, 0.0001), 0.0, 1.0);
}
";

pub const MAIN_FOG: &str = "
let world_position = u.model_matrix * vec4<f32>(input.position, 1.0);
let camera_distance = distance(u.camera_position, world_position.xyz);
output.v_fog_factor = calculate_fog_factor(u.fog_params, camera_distance);
";

pub fn fog_function() -> Snippet {
    Snippet::always(FUNCTION_CALCULATE_FOG_FACTOR)
}

/// CPU mirror of `calculate_fog_factor`.
pub fn fog_factor(start: f32, end: f32, distance: f32) -> f32 {
    ((distance - start) / (end - start).max(0.0001)).clamp(0.0, 1.0)
}
