pub const A_COORDINATES: &str = "a_coordinates";
pub const A_UV: &str = "a_uv";
pub const U_TEXEL_SIZE: &str = "u_texel_size";
pub const VERTEX_SHADER_SOURCE: &str = "
	precision highp float;

	attribute vec2 a_coordinates;
	attribute vec2 a_uv;
	uniform vec2 u_texel_size;
	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	void main() {
	    v_uv = a_uv;
	    v_l = v_uv - vec2(u_texel_size.x, 0.0);
	    v_r = v_uv + vec2(u_texel_size.x, 0.0);
	    v_t = v_uv + vec2(0.0, u_texel_size.y);
	    v_b = v_uv - vec2(0.0, u_texel_size.y);
	    gl_Position = vec4(a_coordinates, 0.0, 1.0);
	}
";

pub const MANUAL_FILTERING: &str = "MANUAL_FILTERING";
pub const U_DISSIPATION: &str = "u_dissipation";
pub const U_DELTA_TIME: &str = "u_delta_time";
pub const U_DYE_TEXEL_SIZE: &str = "u_dye_texel_size";
pub const U_VELOCITY: &str = "u_velocity";
pub const U_SOURCE: &str = "u_source";
pub const ADVECTION_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;

	uniform float u_dissipation;
	uniform float u_delta_time;
	uniform vec2 u_texel_size;
	uniform vec2 u_dye_texel_size;
	uniform sampler2D u_velocity;
	uniform sampler2D u_source;

	vec4 bilerp(sampler2D sam, vec2 uv, vec2 tsize) {
	    vec2 st = uv / tsize - 0.5;
	    vec2 iuv = floor(st);
	    vec2 fuv = fract(st);

	    vec4 a = texture2D(sam, (iuv + vec2(0.5, 0.5)) * tsize);
	    vec4 b = texture2D(sam, (iuv + vec2(1.5, 0.5)) * tsize);
	    vec4 c = texture2D(sam, (iuv + vec2(0.5, 1.5)) * tsize);
	    vec4 d = texture2D(sam, (iuv + vec2(1.5, 1.5)) * tsize);
	    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
	}

	void main() {
	#ifdef MANUAL_FILTERING
	    vec2 coord = v_uv - u_delta_time * bilerp(u_velocity, v_uv, u_texel_size).xy * u_texel_size;
	    vec4 result = bilerp(u_source, coord, u_dye_texel_size);
	#else
	    vec2 coord = v_uv - u_delta_time * texture2D(u_velocity, v_uv).xy * u_texel_size;
	    vec4 result = texture2D(u_source, coord);
	#endif
	    gl_FragColor = result / (1.0 + u_dissipation * u_delta_time);
	}
";

pub const U_FACTOR: &str = "u_factor";
pub const U_OFFSET: &str = "u_offset";
pub const U_TEXTURE: &str = "u_texture";
pub const COPY_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;

	uniform float u_factor;
	uniform float u_offset;
	uniform sampler2D u_texture;

	void main() {
	    gl_FragColor = texture2D(u_texture, v_uv) * u_factor + u_offset;
	}
";

pub const U_COLOR: &str = "u_color";
pub const COLOR_SHADER_SOURCE: &str = "
	precision mediump float;

	uniform vec4 u_color;

	void main() {
	    gl_FragColor = u_color;
	}
";

pub const CURL_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform sampler2D u_velocity;

	void main() {
	    float x_l = texture2D(u_velocity, v_l).y;
	    float x_r = texture2D(u_velocity, v_r).y;
	    float x_t = texture2D(u_velocity, v_t).x;
	    float x_b = texture2D(u_velocity, v_b).x;

	    float curl = x_r - x_l - x_t + x_b;
	    gl_FragColor = vec4(0.5 * curl, 0.0, 0.0, 1.0);
	}
";

pub const U_CURL_SCALE: &str = "u_curl_scale";
pub const U_CURL: &str = "u_curl";
pub const VORTICITY_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform float u_curl_scale;
	uniform float u_delta_time;
	uniform sampler2D u_curl;
	uniform sampler2D u_velocity;

	void main() {
	    float x_l = texture2D(u_curl, v_l).x;
	    float x_r = texture2D(u_curl, v_r).x;
	    float x_t = texture2D(u_curl, v_t).x;
	    float x_b = texture2D(u_curl, v_b).x;
	    float x_c = texture2D(u_curl, v_uv).x;

	    // f = cross(normalize(grad |w|), w), z-only curl
	    vec2 force = 0.5 * vec2(abs(x_t) - abs(x_b), abs(x_r) - abs(x_l));
	    force /= length(force) + 0.0001;
	    force *= u_curl_scale * x_c;
	    force.y *= -1.0;

	    vec2 velocity = texture2D(u_velocity, v_uv).xy;
	    velocity += force * u_delta_time;
	    velocity = min(max(velocity, -1000.0), 1000.0);
	    gl_FragColor = vec4(velocity, 0.0, 1.0);
	}
";

pub const DIVERGENCE_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform sampler2D u_velocity;

	void main() {
	    float x_l = texture2D(u_velocity, v_l).x;
	    float x_r = texture2D(u_velocity, v_r).x;
	    float x_t = texture2D(u_velocity, v_t).y;
	    float x_b = texture2D(u_velocity, v_b).y;
	    vec2 x_c = texture2D(u_velocity, v_uv).xy;

	    if (v_l.x < 0.0) { x_l = -x_c.x; }
	    if (v_r.x > 1.0) { x_r = -x_c.x; }
	    if (v_t.y > 1.0) { x_t = -x_c.y; }
	    if (v_b.y < 0.0) { x_b = -x_c.y; }

	    float divergence = 0.5 * (x_r - x_l + x_t - x_b);
	    gl_FragColor = vec4(divergence, 0.0, 0.0, 1.0);
	}
";

pub const U_PRESSURE: &str = "u_pressure";
pub const U_DIVERGENCE: &str = "u_divergence";
pub const JACOBI_SOLVER_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform sampler2D u_pressure;
	uniform sampler2D u_divergence;

	void main() {
	    float x_l = texture2D(u_pressure, v_l).x;
	    float x_r = texture2D(u_pressure, v_r).x;
	    float x_t = texture2D(u_pressure, v_t).x;
	    float x_b = texture2D(u_pressure, v_b).x;
	    float divergence = texture2D(u_divergence, v_uv).x;

	    float pressure = (x_l + x_r + x_b + x_t - divergence) * 0.25;
	    gl_FragColor = vec4(pressure, 0.0, 0.0, 1.0);
	}
";

pub const GRADIENT_SUBTRACT_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform sampler2D u_pressure;
	uniform sampler2D u_velocity;

	void main() {
	    float x_l = texture2D(u_pressure, v_l).x;
	    float x_r = texture2D(u_pressure, v_r).x;
	    float x_t = texture2D(u_pressure, v_t).x;
	    float x_b = texture2D(u_pressure, v_b).x;

	    vec2 velocity = texture2D(u_velocity, v_uv).xy;
	    velocity -= vec2(x_r - x_l, x_t - x_b);
	    gl_FragColor = vec4(velocity, 0.0, 1.0);
	}
";

pub const U_RADIUS: &str = "u_radius";
pub const U_ASPECT_RATIO: &str = "u_aspect_ratio";
pub const U_POINT: &str = "u_point";
pub const U_TARGET: &str = "u_target";
pub const SPLAT_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;

	uniform float u_radius;
	uniform float u_aspect_ratio;
	uniform vec2 u_point;
	uniform vec3 u_color;
	uniform sampler2D u_target;

	void main() {
	    vec2 p = v_uv - u_point;
	    p.x *= u_aspect_ratio;
	    vec3 splat = exp(-dot(p, p) / u_radius) * u_color;
	    vec3 base = texture2D(u_target, v_uv).xyz;

	    gl_FragColor = vec4(base + splat, 1.0);
	}
";

pub const SHADING: &str = "SHADING";
pub const U_DIM: &str = "u_dim";
pub const U_ALPHA_SCALE: &str = "u_alpha_scale";
pub const DISPLAY_SHADER_SOURCE: &str = "
	precision highp float;
	precision highp sampler2D;

	varying vec2 v_uv;
	varying vec2 v_l;
	varying vec2 v_r;
	varying vec2 v_t;
	varying vec2 v_b;

	uniform float u_dim;
	uniform float u_alpha_scale;
	uniform vec2 u_texel_size;
	uniform sampler2D u_texture;

	void main() {
	    vec3 c = texture2D(u_texture, v_uv).rgb;

	#ifdef SHADING
	    vec3 lc = texture2D(u_texture, v_l).rgb;
	    vec3 rc = texture2D(u_texture, v_r).rgb;
	    vec3 tc = texture2D(u_texture, v_t).rgb;
	    vec3 bc = texture2D(u_texture, v_b).rgb;

	    float dx = length(rc) - length(lc);
	    float dy = length(tc) - length(bc);
	    vec3 n = normalize(vec3(dx, dy, length(u_texel_size)));
	    vec3 l = vec3(0.0, 0.0, 1.0);
	    float diffuse = clamp(dot(n, l) + 0.7, 0.7, 1.0);
	    c *= diffuse;
	#endif

	    c *= u_dim;
	    float a = clamp(max(c.r, max(c.g, c.b)) * u_alpha_scale, 0.0, 1.0);
	    gl_FragColor = vec4(c, a);
	}
";
