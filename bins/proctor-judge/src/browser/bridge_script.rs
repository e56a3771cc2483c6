//! Node.js side of the Playwright bridge.
//!
//! Reads one JSON request per line on stdin, answers one JSON reply per
//! line on stdout. Dialog events are pushed unsolicited as
//! `{"event":"dialog","message":...}`.

pub const BRIDGE_SCRIPT: &str = r#"
'use strict';
const readline = require('readline');

let playwright;
try {
  playwright = require('playwright');
} catch (e) {
  process.stdout.write(JSON.stringify({ id: 0, ok: false, error: { name: 'SetupError', message: 'playwright module not found: ' + e.message } }) + '\n');
  process.exit(2);
}

let browser = null;
let context = null;
let page = null;

function send(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

function requirePage() {
  if (!page) {
    const err = new Error('browser not launched');
    err.name = 'SetupError';
    throw err;
  }
  return page;
}

const handlers = {
  async launch(p) {
    browser = await playwright.chromium.launch({ headless: p.headless !== false });
    context = await browser.newContext();
    page = await context.newPage();
    return null;
  },
  async goto(p) {
    await requirePage().goto(p.url, { waitUntil: 'networkidle', timeout: p.timeout });
    return null;
  },
  async reload(p) {
    await requirePage().reload({ waitUntil: 'networkidle', timeout: p.timeout });
    return null;
  },
  async click(p) {
    await requirePage().locator(p.selector).first().click({ timeout: p.timeout });
    return null;
  },
  async fill(p) {
    await requirePage().locator(p.selector).first().fill(p.value, { timeout: p.timeout });
    return null;
  },
  async hover(p) {
    await requirePage().locator(p.selector).first().hover({ timeout: p.timeout });
    return null;
  },
  async submit(p) {
    await requirePage().locator(p.selector).first().evaluate((form) => {
      if (typeof form.requestSubmit === 'function') {
        form.requestSubmit();
      } else {
        form.submit();
      }
    }, null, { timeout: p.timeout });
    return null;
  },
  async isVisible(p) {
    return await requirePage().locator(p.selector).first().isVisible();
  },
  async textContent(p) {
    const loc = requirePage().locator(p.selector);
    if ((await loc.count()) === 0) {
      return null;
    }
    return await loc.first().textContent({ timeout: p.timeout });
  },
  async computedStyle(p) {
    return await requirePage().locator(p.selector).first().evaluate(
      (el, prop) => window.getComputedStyle(el).getPropertyValue(prop),
      p.property,
      { timeout: p.timeout }
    );
  },
  async attribute(p) {
    return await requirePage().locator(p.selector).first().getAttribute(p.name, { timeout: p.timeout });
  },
  async waitHidden(p) {
    try {
      await requirePage().locator(p.selector).first().waitFor({ state: 'hidden', timeout: p.timeout });
      return true;
    } catch (e) {
      if (e.name === 'TimeoutError') {
        return false;
      }
      throw e;
    }
  },
  async url() {
    return requirePage().url();
  },
  async armDialog() {
    requirePage().once('dialog', async (dialog) => {
      send({ event: 'dialog', message: dialog.message() });
      try {
        await dialog.dismiss();
      } catch (e) {
        // page may already be gone
      }
    });
    return null;
  },
  async close() {
    if (browser) {
      await browser.close();
    }
    browser = null;
    context = null;
    page = null;
    return null;
  },
};

const rl = readline.createInterface({ input: process.stdin });

rl.on('line', async (line) => {
  if (!line.trim()) {
    return;
  }
  let req;
  try {
    req = JSON.parse(line);
  } catch (e) {
    send({ id: 0, ok: false, error: { name: 'ProtocolError', message: 'invalid request: ' + e.message } });
    return;
  }
  const handler = handlers[req.method];
  if (!handler) {
    send({ id: req.id, ok: false, error: { name: 'ProtocolError', message: 'unknown method ' + req.method } });
    return;
  }
  try {
    const result = await handler(req.params || {});
    send({ id: req.id, ok: true, result: result === undefined ? null : result });
  } catch (e) {
    send({ id: req.id, ok: false, error: { name: e.name || 'Error', message: String(e.message || e) } });
  }
  if (req.method === 'close') {
    rl.close();
  }
});

rl.on('close', async () => {
  if (browser) {
    try {
      await browser.close();
    } catch (e) {
      // ignore
    }
    browser = null;
  }
});
"#;
