use tpf_macros::pipeline_step;

#[pipeline_step(name = 42)]
struct BadStep;

fn main() {}
