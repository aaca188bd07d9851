/*!
 * Benchmarks for masking operations.
 *
 * Measures performance of:
 * - Structural masking of growing documents
 * - The math-only fallback
 * - Unmasking with loss reporting
 */

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use paperglot::latex::masker::fallback_spans;
use paperglot::latex::{Masker, mask, unmask_with_report};

const SECTION: &str = r#"\section{Results}
Our model reaches $98.2\%$ accuracy~\cite{smith2020, lee2021} on the benchmark
described in Section~\ref{sec:setup}, improving on \citet{doe2019} by a wide margin.

\begin{equation}
\mathcal{L}(\theta) = \sum_{i=1}^{n} \log p_\theta(y_i \mid x_i)
\label{eq:loss}
\end{equation}

\begin{figure}[t]
\centering
\includegraphics[width=0.9\linewidth]{results.pdf}
\caption{Accuracy over training steps for $k \in \{1, 2, 4\}$.}
\label{fig:results}
\end{figure}

\begin{tabular}{lcc}
Model & Acc & F1 \\
Ours & 98.2 & 97.5 \\
\end{tabular}

"#;

fn generate_document(sections: usize) -> String {
    SECTION.repeat(sections)
}

fn bench_structural_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_masking");
    let masker = Masker::default();

    for sections in [1, 10, 50, 200].iter() {
        let document = generate_document(*sections);
        group.throughput(Throughput::Bytes(document.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &document, |b, document| {
            b.iter(|| black_box(masker.mask(document)));
        });
    }

    group.finish();
}

fn bench_fallback_spans(c: &mut Criterion) {
    let document = generate_document(50);

    c.bench_function("fallback_spans_50_sections", |b| {
        b.iter(|| black_box(fallback_spans(&document)));
    });
}

fn bench_unmask(c: &mut Criterion) {
    let mut group = c.benchmark_group("unmask");

    for sections in [10, 200].iter() {
        let masked = mask(&generate_document(*sections));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &masked, |b, masked| {
            b.iter(|| black_box(unmask_with_report(&masked.masked_text, &masked.table)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_structural_masking, bench_fallback_spans, bench_unmask);
criterion_main!(benches);
