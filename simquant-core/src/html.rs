//! HTML report generation
//!
//! Generates one self-contained HTML document with embedded CSS, the report
//! model as JSON, and the toggle engine. Reports work offline and never talk
//! back to the producer.

use crate::embed::EmbeddedModel;
use crate::hierarchy::{Hierarchy, PeptideAssignment, PeptideIdx, ScanIdx, SpotIdx};
use crate::index::{AggregateRef, IdentityIndex, NodeRef};
use crate::session::AggregateTable;
use crate::stats::ValueFormat;
use crate::visuals::VisualSource;
use anyhow::{Context, Result};

/// Element id of the embedded JSON model
pub const MODEL_ELEMENT_ID: &str = "simquant-model";

/// Everything the renderer reads
pub struct ReportInput<'a> {
    pub title: &'a str,
    pub hierarchy: &'a Hierarchy,
    pub index: &'a IdentityIndex,
    pub model: &'a EmbeddedModel,
    /// Aggregate values shown before any toggle
    pub initial: &'a AggregateTable,
    pub visuals: &'a dyn VisualSource,
}

impl ReportInput<'_> {
    fn format(&self) -> ValueFormat {
        self.model.format
    }

    fn agg_cells(&self, agg: AggregateRef) -> String {
        let label = self.index.aggregate_label(agg);
        let fmt = self.format();
        self.initial
            .get(agg)
            .fields()
            .iter()
            .map(|(field, value)| {
                format!(
                    r#"<td class="num" data-agg="{label}" data-field="{field}">{value}</td>"#,
                    label = label,
                    field = field.as_str(),
                    value = html_escape(&fmt.format_opt(*value)),
                )
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Render the interactive report
pub fn render_report(input: &ReportInput<'_>) -> Result<String> {
    let model_json = input.model.to_script()?;
    let proteins = render_protein_table(input);
    let details = if input.hierarchy.is_empty() {
        render_empty_section("Quantified peptides", "No peptides were quantified.")
    } else {
        render_detail_table(input)?
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        {header}
        {ambiguous}
        {proteins}
        {details}
        {footer}
    </div>
    <script type="application/json" id="{model_id}">{model}</script>
    <script>{js}</script>
</body>
</html>"#,
        title = html_escape(input.title),
        css = inline_css(),
        header = render_header(input),
        ambiguous = render_ambiguous_section(input),
        proteins = proteins,
        details = details,
        footer = render_footer(),
        model_id = MODEL_ELEMENT_ID,
        model = model_json,
        js = inline_javascript(),
    ))
}

/// Inline CSS styles
fn inline_css() -> &'static str {
    r#"
/* Reset & Base */
* {
    box-sizing: border-box;
    margin: 0;
    padding: 0;
}

body {
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    line-height: 1.6;
    color: #111827;
    background: #ffffff;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    padding: 2rem;
}

header {
    margin-bottom: 2rem;
    padding-bottom: 1rem;
    border-bottom: 2px solid #e5e7eb;
}

header h1 {
    font-size: 2rem;
    font-weight: 700;
    margin-bottom: 0.5rem;
}

header .meta {
    color: #6b7280;
    font-size: 0.875rem;
}

.section {
    margin-bottom: 2rem;
}

.section h2 {
    font-size: 1.5rem;
    font-weight: 700;
    margin-bottom: 1rem;
}

.section .empty {
    color: #6b7280;
    font-style: italic;
}

.attention {
    border-left: 4px solid #f97316;
    padding-left: 1rem;
}

table {
    width: 100%;
    border-collapse: collapse;
    background: #ffffff;
}

thead {
    background: #f9fafb;
}

th {
    padding: 0.5rem 0.75rem;
    text-align: left;
    font-weight: 600;
    font-size: 0.875rem;
    color: #374151;
    border-bottom: 2px solid #e5e7eb;
}

td {
    padding: 0.4rem 0.75rem;
    border-bottom: 1px solid #e5e7eb;
    font-size: 0.875rem;
    vertical-align: top;
}

td.num {
    text-align: right;
    font-variant-numeric: tabular-nums;
}

tr.protein-row, tr.peptide-row {
    background: #e5e7eb;
    font-weight: 600;
}

tr.not-counted td {
    color: #6b7280;
}

.meta {
    color: #6b7280;
    font-weight: 400;
}

tr.spot-row {
    background: #f3f4f6;
}

tr.scan-row td:first-child {
    padding-left: 2rem;
}

.scan-name {
    cursor: pointer;
}

.scan-name:hover {
    text-decoration: underline;
}

td.toggle-cell {
    text-align: center;
    cursor: pointer;
    user-select: none;
    width: 8rem;
}

td.toggle-cell.included {
    background: #b1d28f;
}

td.toggle-cell.excluded {
    background: #f08682;
}

td.toggle-cell:hover {
    outline: 1px solid #111827;
}

tr.scan-visual td {
    background: #ffffff;
}

tr.scan-visual .caption {
    color: #374151;
    font-size: 0.8rem;
    margin-bottom: 0.25rem;
}

tr.scan-visual svg {
    width: 100%;
    height: auto;
    max-height: 320px;
}

.controls {
    margin-bottom: 1rem;
}

.controls button {
    padding: 0.25rem 0.75rem;
    margin-right: 0.5rem;
    border: 1px solid #d1d5db;
    border-radius: 0.25rem;
    background: #f9fafb;
    cursor: pointer;
}

.controls button:hover {
    background: #e5e7eb;
}

@keyframes flash {
    from { background-color: #ff3f3f; }
    to { background-color: #e5e7eb; }
}

tr.flash {
    animation: flash 0.7s ease-out;
}

footer {
    margin-top: 3rem;
    padding-top: 1rem;
    border-top: 1px solid #e5e7eb;
    text-align: center;
    color: #6b7280;
    font-size: 0.875rem;
}

@media (max-width: 768px) {
    .container {
        padding: 1rem;
    }

    header h1 {
        font-size: 1.5rem;
    }

    th, td {
        padding: 0.3rem;
    }
}
"#
}

/// Toggle engine: reads the embedded model, keeps per-scan inclusion state,
/// and recomputes impacted aggregates with the same arithmetic and
/// formatting as the renderer.
fn inline_javascript() -> &'static str {
    r#"
(function() {
    'use strict';
    var NO_DATA = '-';
    var source = document.getElementById('simquant-model');
    if (!source) return;
    var model = JSON.parse(source.textContent);
    var included = {};
    Object.keys(model.scans).forEach(function(scan) { included[scan] = true; });

    function formatValue(value) {
        if (value > model.format.cap) return '>' + String(model.format.cap);
        return value.toFixed(model.format.places);
    }

    // Population mean / standard deviation; null when there is nothing to summarize
    function summarize(values) {
        if (values.length === 0) return null;
        var sum = 0;
        for (var i = 0; i < values.length; i++) sum += values[i];
        var mean = sum / values.length;
        var squares = 0;
        for (var j = 0; j < values.length; j++) {
            var d = values[j] - mean;
            squares += d * d;
        }
        return { mean: mean, sd: Math.sqrt(squares / values.length) };
    }

    function recompute(agg) {
        var members = model.membership[agg];
        if (!members) throw new Error('no membership entry for ' + agg);
        var ratios = [];
        var snrs = [];
        members.forEach(function(scan) {
            if (!included[scan]) return;
            ratios.push(model.scans[scan].ratio);
            snrs.push(model.scans[scan].snr);
        });
        var ratio = summarize(ratios);
        var snr = summarize(snrs);
        return {
            'ratio-mean': ratio ? formatValue(ratio.mean) : NO_DATA,
            'ratio-sd': ratio ? formatValue(ratio.sd) : NO_DATA,
            'snr-mean': snr ? formatValue(snr.mean) : NO_DATA,
            'snr-sd': snr ? formatValue(snr.sd) : NO_DATA
        };
    }

    function display(agg, values) {
        document.querySelectorAll('[data-agg="' + agg + '"]').forEach(function(cell) {
            var text = values[cell.dataset.field];
            if (text !== undefined) cell.textContent = text;
        });
    }

    function toggleScan(scan) {
        var impacted = model.impact[scan];
        if (!impacted) throw new Error('no impact entry for ' + scan);
        included[scan] = !included[scan];
        var state = included[scan] ? 'included' : 'excluded';
        document.querySelectorAll('[data-scan="' + scan + '"]').forEach(function(cell) {
            cell.textContent = state;
            cell.classList.remove('included', 'excluded');
            cell.classList.add(state);
        });
        impacted.forEach(function(agg) { display(agg, recompute(agg)); });
    }

    function setVisuals(visible) {
        document.querySelectorAll('tr.scan-visual').forEach(function(row) {
            row.style.display = visible ? '' : 'none';
        });
    }

    function toggleVisual(id) {
        var row = document.getElementById(id);
        if (row) row.style.display = row.style.display === 'none' ? '' : 'none';
    }

    function flashRow(id) {
        var row = document.getElementById(id);
        if (!row) return;
        row.classList.remove('flash');
        void row.offsetWidth;
        row.classList.add('flash');
    }

    window.__sqToggleScan = toggleScan;
    window.__sqIsIncluded = function(scan) { return !!included[scan]; };

    document.addEventListener('DOMContentLoaded', function() {
        document.querySelectorAll('td.toggle-cell[data-scan]').forEach(function(cell) {
            cell.addEventListener('click', function() { toggleScan(this.dataset.scan); });
        });
        document.querySelectorAll('[data-visual-target]').forEach(function(el) {
            el.addEventListener('click', function() { toggleVisual(this.dataset.visualTarget); });
        });
        document.querySelectorAll('a[data-flash]').forEach(function(link) {
            link.addEventListener('click', function() { flashRow(this.dataset.flash); });
        });
        var show = document.getElementById('show-visuals');
        var hide = document.getElementById('hide-visuals');
        if (show) show.addEventListener('click', function() { setVisuals(true); });
        if (hide) hide.addEventListener('click', function() { setVisuals(false); });
    });
})();
"#
}

/// Render header section
fn render_header(input: &ReportInput<'_>) -> String {
    let h = input.hierarchy;
    format!(
        r#"<header>
    <h1>{title}</h1>
    <div class="meta">{summary}</div>
</header>"#,
        title = html_escape(input.title),
        summary = summary_sentence(h.proteins.len(), h.peptides.len(), h.spots.len()),
    )
}

/// "Quantified 2 proteins with 5 peptides in 7 spots."
pub fn summary_sentence(proteins: usize, peptides: usize, spots: usize) -> String {
    format!(
        "Quantified {} protein{} with {} peptide{} in {} spot{}.",
        proteins,
        plural(proteins),
        peptides,
        plural(peptides),
        spots,
        plural(spots)
    )
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn render_empty_section(heading: &str, message: &str) -> String {
    format!(
        r#"<section class="section">
    <h2>{heading}</h2>
    <p class="empty">{message}</p>
</section>"#,
        heading = heading,
        message = message,
    )
}

/// Peptides whose protein could not be determined
fn render_ambiguous_section(input: &ReportInput<'_>) -> String {
    let ambiguous = &input.hierarchy.ambiguous;
    if ambiguous.is_empty() {
        return String::new();
    }

    let mut rows = String::new();
    for entry in ambiguous {
        let peptide = match entry.peptide {
            Some(p) => peptide_link(input, p),
            None => html_escape(&entry.sequence),
        };
        if entry.candidates.is_empty() {
            rows.push_str(&format!(
                r#"<tr><td>{peptide}</td><td><i>(unable to match to protein)</i></td></tr>"#,
                peptide = peptide,
            ));
            continue;
        }
        for (i, protein) in entry.candidates.iter().enumerate() {
            if i == 0 {
                rows.push_str(&format!(
                    r#"<tr><td rowspan="{span}">{peptide}</td><td>{protein}</td></tr>"#,
                    span = entry.candidates.len(),
                    peptide = peptide,
                    protein = html_escape(protein),
                ));
            } else {
                rows.push_str(&format!(
                    r#"<tr><td>{protein}</td></tr>"#,
                    protein = html_escape(protein)
                ));
            }
        }
    }

    format!(
        r#"<section class="section attention" id="ambiguous">
    <h2>Attention: ambiguous peptides</h2>
    <p>These peptides could not be assigned to exactly one protein and are left out of protein-level values.</p>
    <table>
        <thead><tr><th>Peptide</th><th>Proteins</th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>"#,
        rows = rows,
    )
}

fn aggregate_header(first: &str, extra: &str) -> String {
    format!(
        r#"<thead>
            <tr><th rowspan="2">{first}</th><th colspan="2">Ratio</th><th colspan="2">SNR</th>{extra}</tr>
            <tr><th>mean</th><th>std. dev.</th><th>mean</th><th>std. dev.</th></tr>
        </thead>"#,
        first = first,
        extra = extra,
    )
}

fn peptide_link(input: &ReportInput<'_>, peptide: PeptideIdx) -> String {
    let label = input.index.label(NodeRef::Peptide(peptide));
    format!(
        r##"<a href="#{label}" data-flash="{label}">{sequence}</a>"##,
        label = label,
        sequence = html_escape(&input.hierarchy.peptide(peptide).sequence),
    )
}

/// Protein summary with each protein's uniquely assigned peptides
fn render_protein_table(input: &ReportInput<'_>) -> String {
    let h = input.hierarchy;
    if h.proteins.is_empty() {
        return render_empty_section("Quantified proteins", "No proteins were quantified.");
    }

    let mut rows = String::new();
    for protein in h.proteins_for_display() {
        let agg = AggregateRef::Protein(protein);
        rows.push_str(&format!(
            r#"<tr class="protein-row" id="{label}"><td>{name}</td>{cells}</tr>"#,
            label = input.index.aggregate_label(agg),
            name = html_escape(&h.protein(protein).name),
            cells = input.agg_cells(agg),
        ));
        for &peptide in &h.protein(protein).peptides {
            rows.push_str(&format!(
                r#"<tr><td>{link}</td>{cells}</tr>"#,
                link = peptide_link(input, peptide),
                cells = input.agg_cells(AggregateRef::Peptide(peptide)),
            ));
        }
        // Listed peptides that feed no protein value
        for &peptide in &h.protein(protein).listed {
            if h.protein_of(peptide) == Some(protein) {
                continue;
            }
            rows.push_str(&format!(
                r#"<tr class="not-counted"><td>{link} <span class="meta">(ambiguous)</span></td><td colspan="4"></td></tr>"#,
                link = peptide_link(input, peptide),
            ));
        }
    }

    format!(
        r#"<section class="section" id="proteins">
    <h2>Quantified proteins</h2>
    <table>
        {head}
        <tbody>{rows}</tbody>
    </table>
</section>"#,
        head = aggregate_header("Protein / Peptides", ""),
        rows = rows,
    )
}

/// Peptide / spot / scan detail table with inclusion toggles
fn render_detail_table(input: &ReportInput<'_>) -> Result<String> {
    let h = input.hierarchy;
    let mut rows = String::new();

    for peptide in h.peptides_for_display() {
        let agg = AggregateRef::Peptide(peptide);
        let note = match &h.peptide(peptide).assignment {
            PeptideAssignment::Unique(p) => {
                format!(r#" <span class="meta">({})</span>"#, html_escape(&h.protein(*p).name))
            }
            PeptideAssignment::Ambiguous(_) => r#" <span class="meta">(ambiguous)</span>"#.to_string(),
            PeptideAssignment::Unassigned => String::new(),
        };
        rows.push_str(&format!(
            r#"<tr class="peptide-row" id="{label}"><td>{sequence}{note}</td>{cells}<td></td></tr>"#,
            label = input.index.aggregate_label(agg),
            sequence = html_escape(&h.peptide(peptide).sequence),
            note = note,
            cells = input.agg_cells(agg),
        ));

        for spot in h.spots_for_display(peptide) {
            rows.push_str(&render_spot_rows(input, spot)?);
        }
    }

    let controls = if input.visuals.enabled() {
        r#"<div class="controls">
        <button type="button" id="show-visuals">Show all charts</button>
        <button type="button" id="hide-visuals">Hide all charts</button>
    </div>"#
    } else {
        ""
    };

    Ok(format!(
        r#"<section class="section" id="peptides">
    <h2>Quantified peptides</h2>
    {controls}
    <table>
        {head}
        <tbody>{rows}</tbody>
    </table>
</section>"#,
        controls = controls,
        head = aggregate_header("Peptide / Spot / Scan", r#"<th rowspan="2">manual exclusion</th>"#),
        rows = rows,
    ))
}

fn render_spot_rows(input: &ReportInput<'_>, spot: SpotIdx) -> Result<String> {
    let h = input.hierarchy;
    let agg = AggregateRef::Spot(spot);
    let mut rows = format!(
        r#"<tr class="spot-row" id="{label}"><td>{name}</td>{cells}<td></td></tr>"#,
        label = input.index.aggregate_label(agg),
        name = html_escape(&h.spot(spot).label),
        cells = input.agg_cells(agg),
    );
    for scan in h.scans_for_display(spot) {
        rows.push_str(&render_scan_rows(input, scan)?);
    }
    Ok(rows)
}

fn render_scan_rows(input: &ReportInput<'_>, scan_idx: ScanIdx) -> Result<String> {
    let h = input.hierarchy;
    let scan = h.scan(scan_idx);
    let label = input.index.scan_label(scan_idx);
    let fmt = input.format();
    let visual_id = format!("visual-{}", label);
    let show_visual = input.visuals.enabled();

    let name = if show_visual {
        format!(
            r#"<span class="scan-name" data-visual-target="{id}">scan #{number} (charge {charge}+)</span>"#,
            id = visual_id,
            number = html_escape(&scan.number),
            charge = scan.charge,
        )
    } else {
        format!(
            "scan #{number} (charge {charge}+)",
            number = html_escape(&scan.number),
            charge = scan.charge
        )
    };

    let mut rows = format!(
        r#"<tr class="scan-row"><td>{name}</td><td class="num">{ratio}</td><td></td><td class="num">{snr}</td><td></td><td class="toggle-cell included" data-scan="{label}">included</td></tr>"#,
        name = name,
        ratio = html_escape(&fmt.format(scan.ratio)),
        snr = html_escape(&fmt.format(scan.snr)),
        label = label,
    );

    if show_visual {
        let chart = match &scan.visual_ref {
            Some(reference) => input.visuals.load(reference).with_context(|| {
                format!(
                    "Failed to load visual for scan #{} of peptide {}",
                    scan.number,
                    h.peptide(scan.peptide).sequence
                )
            })?,
            None => String::new(),
        };
        rows.push_str(&format!(
            r#"<tr class="scan-visual" id="{id}"><td colspan="6"><div class="caption">{caption}</div>{chart}</td></tr>"#,
            id = visual_id,
            caption = html_escape(&scan_caption(h, scan_idx)),
            chart = chart,
        ));
    }

    Ok(rows)
}

/// `"{spot} #{scan} @ {rt} minutes: charge: {z}+ / {filter line}"`
pub fn scan_caption(hierarchy: &Hierarchy, scan_idx: ScanIdx) -> String {
    let scan = hierarchy.scan(scan_idx);
    let mut caption = format!(
        "{} #{} @ {:.2} minutes: charge: {}+",
        hierarchy.spot(scan.spot).label,
        scan.number,
        scan.retention_time,
        scan.charge
    );
    if let Some(filter) = &scan.filter_line {
        caption.push_str(" / ");
        caption.push_str(filter);
    }
    caption
}

/// Render footer
fn render_footer() -> String {
    r#"<footer>
    <p>Generated by SimQuant. Click a cell in the manual exclusion column to include or exclude a scan; dependent values update in place.</p>
</footer>"#
        .to_string()
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
