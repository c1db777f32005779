use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    "[MSG_0001] Tact: \"Milfeulle, take the Lucky Star out.\"\r\n"
        .repeat(4096)
        .into_bytes()
}

pub mod compress {
    use divan::Bencher;

    #[divan::bench]
    fn text(bencher: Bencher) {
        bencher
            .with_inputs(super::get_input)
            .bench_refs(|data| divan::black_box(ga2_arz::compress(data).unwrap()));
    }

    #[divan::bench]
    fn noise(bencher: Bencher) {
        bencher
            .with_inputs(|| {
                (0..(1u32 << 18))
                    .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
                    .collect::<Vec<_>>()
            })
            .bench_refs(|data| divan::black_box(ga2_arz::compress(data).unwrap()));
    }
}

pub mod decompress {
    use divan::Bencher;

    #[divan::bench]
    fn text(bencher: Bencher) {
        bencher
            .with_inputs(|| ga2_arz::compress(&super::get_input()).unwrap())
            .bench_refs(|stream| divan::black_box(ga2_arz::decompress(stream).unwrap()));
    }
}
