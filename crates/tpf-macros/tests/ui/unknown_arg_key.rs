use tpf_macros::pipeline_step;

#[pipeline_step(label = "price_step")]
struct BadStep;

fn main() {}
