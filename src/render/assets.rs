pub(super) const REPORT_CSS: &str = r##"body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    margin: 0;
    color: #222;
    background: #fafafa;
}
header {
    background: #2d3e50;
    color: #fff;
    padding: 0.8em 1.5em;
}
header h1 { margin: 0; font-size: 1.4em; }
header .build { font-weight: normal; opacity: 0.8; }
nav a { color: #cde; margin-right: 1em; }
main { padding: 1em 1.5em; }
table.stats { border-collapse: collapse; margin: 1em 0; width: 100%; }
table.stats th, table.stats td { border: 1px solid #ddd; padding: 0.3em 0.6em; text-align: right; }
table.stats th:first-child, table.stats td:first-child { text-align: left; }
table.sortable th { cursor: pointer; }
table.data { border-collapse: collapse; margin: 0.3em 0 0.3em 2em; }
table.data td { border: 1px solid #ccc; padding: 0.1em 0.5em; }
.badge { border-radius: 3px; padding: 0.1em 0.4em; font-size: 0.8em; color: #fff; }
.badge.passed { background: #3c9a3c; }
.badge.failed { background: #c0392b; }
.badge.skipped { background: #7f8c8d; }
.badge.pending { background: #d4a017; }
.badge.undefined { background: #b9770e; }
.badge.missing { background: #8e44ad; }
.scenario { background: #fff; border: 1px solid #e3e3e3; margin: 0.8em 0; padding: 0.5em 1em; }
.scenario.background { background: #f3f6f9; }
.scenario.collapsed ol, .scenario.collapsed ul { display: none; }
.toggle { cursor: pointer; font-size: 1.05em; }
.keyword { font-weight: bold; }
.duration, .reported, .uri { color: #777; font-size: 0.85em; }
pre.error { background: #fdecea; border-left: 3px solid #c0392b; padding: 0.5em; overflow-x: auto; }
pre.description { white-space: pre-wrap; }
.tag { background: #e8eef4; border-radius: 3px; padding: 0.1em 0.4em; margin-right: 0.3em; }
.verdict.failed { border: 1px solid #c0392b; background: #fdecea; padding: 0.5em 1em; }
#chart { display: flex; height: 1.4em; margin: 0.5em 0 1em; }
#chart div { height: 100%; }
"##;

pub(super) const REPORT_JS: &str = r##"(function () {
  "use strict";

  var colors = {
    passed: "#3c9a3c",
    failed: "#c0392b",
    skipped: "#7f8c8d",
    pending: "#d4a017",
    undefined: "#b9770e",
    missing: "#8e44ad"
  };

  function drawChart() {
    var source = document.getElementById("chart-data");
    var chart = document.getElementById("chart");
    if (!source || !chart) {
      return;
    }
    var data = JSON.parse(source.textContent);
    var total = 0;
    Object.keys(colors).forEach(function (key) {
      total += data[key] || 0;
    });
    if (total === 0) {
      return;
    }
    Object.keys(colors).forEach(function (key) {
      var count = data[key] || 0;
      if (count === 0) {
        return;
      }
      var bar = document.createElement("div");
      bar.style.width = (100 * count / total) + "%";
      bar.style.background = colors[key];
      bar.title = key + ": " + count;
      chart.appendChild(bar);
    });
  }

  function enableToggles() {
    document.querySelectorAll(".scenario .toggle").forEach(function (heading) {
      heading.addEventListener("click", function () {
        heading.parentElement.classList.toggle("collapsed");
      });
    });
  }

  function sortValue(cell) {
    var raw = cell.getAttribute("data-sort") || cell.textContent.trim();
    var number = Number(raw);
    return isNaN(number) ? raw.toLowerCase() : number;
  }

  function enableSorting() {
    document.querySelectorAll("table.sortable").forEach(function (table) {
      table.querySelectorAll("th").forEach(function (th, column) {
        var ascending = true;
        th.addEventListener("click", function () {
          var body = table.tBodies[0];
          var rows = Array.prototype.slice.call(body.rows);
          rows.sort(function (a, b) {
            var left = sortValue(a.cells[column]);
            var right = sortValue(b.cells[column]);
            if (left < right) { return ascending ? -1 : 1; }
            if (left > right) { return ascending ? 1 : -1; }
            return 0;
          });
          ascending = !ascending;
          rows.forEach(function (row) { body.appendChild(row); });
        });
      });
    });
  }

  document.addEventListener("DOMContentLoaded", function () {
    drawChart();
    enableToggles();
    enableSorting();
  });
})();
"##;
