use criterion::{black_box, criterion_group, criterion_main, Criterion};

use procsim_rust::pipeline::config::PipelineOptions;
use procsim_rust::pipeline::simulator::Pipeline;
use procsim_rust::Instruction;

/// Synthetic trace with a RAW chain every few instructions and a taken
/// branch every 16th line, deterministic so runs are comparable.
fn synthetic_trace(len: usize) -> Vec<Instruction> {
    (0..len)
        .map(|ip| {
            let is_branch = ip % 16 == 15;
            let reg = |r: usize| Some(r % 32);
            Instruction {
                idx: 0,
                ip,
                addr: 0x1000 + 4 * ip as u32,
                fu_type: ip % 3,
                dest_reg: if is_branch { None } else { reg(ip) },
                src_regs: [
                    if ip % 4 == 1 { reg(ip.wrapping_sub(1)) } else { None },
                    None,
                ],
                branch_addr: if is_branch { Some(0x2000) } else { None },
                taken: is_branch && ip % 32 == 15,
                predicted: false,
                speculative: false,
            }
        })
        .collect()
}

fn pipeline_throughput_benchmark(c: &mut Criterion) {
    let trace = synthetic_trace(10_000);

    c.bench_function("pipeline_10k_narrow", |b| {
        b.iter(|| {
            let options = PipelineOptions::new(4, 1, 1, 1, 2);
            let mut pipeline = Pipeline::new(trace.clone(), options).unwrap();
            black_box(pipeline.run());
        });
    });

    c.bench_function("pipeline_10k_wide", |b| {
        b.iter(|| {
            let options = PipelineOptions::new(8, 2, 2, 2, 8);
            let mut pipeline = Pipeline::new(trace.clone(), options).unwrap();
            black_box(pipeline.run());
        });
    });
}

fn predictor_benchmark(c: &mut Criterion) {
    use procsim_rust::pipeline::predictor::BranchPredictor;

    c.bench_function("predictor_predict_update", |b| {
        b.iter(|| {
            let mut bp = BranchPredictor::new();
            for i in 0..1_000u32 {
                let addr = 0x1000 + 4 * (i % 200);
                let taken = i % 3 == 0;
                black_box(bp.predict(addr));
                bp.update(addr, taken);
            }
        });
    });
}

criterion_group!(benches, pipeline_throughput_benchmark, predictor_benchmark);
criterion_main!(benches);
