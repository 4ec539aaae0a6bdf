/// Benchmarks for parsing and descriptor evaluation.
///
/// Run with: `cargo bench`

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use solpattern::domain::evaluator;
use solpattern::infrastructure::load_descriptors;
use solpattern::infrastructure::solidity::parse_source;

/// A source with `contracts` copies of a small vault.
fn synthetic_source(contracts: usize) -> String {
    let mut source = String::from("pragma solidity ^0.8.0;\n");
    for index in 0..contracts {
        source.push_str(&format!(
            r#"
contract Vault{index} {{
    address public owner;
    bool public stopped;
    mapping(address => uint256) public balances;

    struct Entry {{ uint8 kind; bool active; address holder; uint256 amount; }}

    modifier onlyOwner() {{ require(msg.sender == owner); _; }}
    modifier stopInEmergency() {{ require(!stopped); _; }}

    function toggle() external onlyOwner {{ stopped = !stopped; }}

    function withdraw(uint256 amount) external stopInEmergency {{
        require(balances[msg.sender] >= amount);
        balances[msg.sender] -= amount;
        payable(msg.sender).transfer(amount);
    }}

    fallback() external {{ revert(); }}
}}
"#
        ));
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for contracts in [1, 10, 100] {
        let source = synthetic_source(contracts);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(contracts), &source, |b, source| {
            b.iter(|| parse_source(black_box(source)))
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let library = Path::new(env!("CARGO_MANIFEST_DIR")).join("descriptors");
    let Ok(descriptors) = load_descriptors(&library) else {
        return;
    };
    let mut group = c.benchmark_group("evaluate");
    for contracts in [1, 10, 100] {
        let Ok(unit) = parse_source(&synthetic_source(contracts)) else {
            continue;
        };
        group.throughput(Throughput::Elements(contracts as u64));
        group.bench_with_input(BenchmarkId::from_parameter(contracts), &unit, |b, unit| {
            b.iter(|| evaluator::analyze(black_box(unit), &descriptors))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_evaluate);
criterion_main!(benches);
